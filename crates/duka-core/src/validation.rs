//! # Validation Module
//!
//! Input validation for Duka. Runs before any transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer (outside this workspace)                       │
//! │  └── Deserialization, type checks                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths, positive quantities                     │
//! │  └── Called by duka-db workflows before `BEGIN`                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (product_id, batch_code)                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::validation::{validate_batch_code, validate_quantity};
//!
//! validate_batch_code("PCM-2025-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a batch code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, `-`, `_`, `/` and `.` only
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_batch_code;
///
/// assert!(validate_batch_code("LOT/2025.03").is_ok());
/// assert!(validate_batch_code("").is_err());
/// assert!(validate_batch_code("has space").is_err());
/// ```
pub fn validate_batch_code(code: &str) -> ValidationResult<()> {
    let code = required("batch_code", code, 50)?;

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_code".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '/' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required("name", name, 200).map(|_| ())
}

/// Validates a customer name (1-100 characters).
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required("customer_name", name, 100).map(|_| ())
}

/// Validates a phone number.
///
/// ## Rules
/// - 7 to 20 characters after trimming
/// - Digits, spaces and a single leading `+`
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = required("phone", phone, 20)?;
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    let valid = digits.chars().all(|c| c.is_ascii_digit() || c == ' ')
        && digits.chars().filter(char::is_ascii_digit).count() >= 7;

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be at least 7 digits, optionally starting with '+'".to_string(),
        });
    }

    Ok(())
}

/// Validates free text such as notes or a refund reason (optional, max 500).
pub fn validate_note(field: &str, text: Option<&str>) -> ValidationResult<()> {
    match text {
        Some(t) if t.chars().count() > 500 => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 500,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed, anything above
/// [`MAX_PRICE_CENTS`] is not.
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("buying_price", 1099).is_ok());
/// assert!(validate_price_cents("buying_price", 0).is_ok());
/// assert!(validate_price_cents("buying_price", -100).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of line items on an order or sale.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::EmptyItems);
    }

    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_uuid;
///
/// assert!(validate_uuid("batch_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("batch_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
