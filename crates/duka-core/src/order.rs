//! # Order Workflow
//!
//! Pure state machine for orders. The database layer asks this module
//! whether an action is allowed before it writes anything.
//!
//! ## Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌─────────┐  confirm   ┌───────────┐                                  │
//! │   │ pending ├───────────►│ confirmed │  (terminal)                      │
//! │   └────┬────┘            └─────▲─────┘                                  │
//! │        │ reject                │ confirm                                │
//! │        ▼                       │                                        │
//! │   ┌──────────┐  resend   ┌─────┴─────┐                                  │
//! │   │ rejected ├──────────►│  updated  │                                  │
//! │   └────┬─────┘◄──────────┴───────────┘                                  │
//! │        │          reject                                                │
//! │        ▼ delete                                                         │
//! │   (row removed)                                                         │
//! │                                                                         │
//! │   update (replace items) is allowed in rejected and updated and         │
//! │   leaves the status as it is.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

/// An action a caller wants to perform on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Confirm,
    Reject,
    Resend,
    Update,
    Delete,
}

impl OrderAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Confirm => "confirm",
            OrderAction::Reject => "reject",
            OrderAction::Resend => "resend",
            OrderAction::Update => "update",
            OrderAction::Delete => "delete",
        }
    }

    /// Statuses the action may start from.
    ///
    /// The database layer uses this list in its conditional `UPDATE`, so two
    /// concurrent confirmations cannot both succeed.
    pub const fn allowed_from(&self) -> &'static [OrderStatus] {
        match self {
            OrderAction::Confirm | OrderAction::Reject => {
                &[OrderStatus::Pending, OrderStatus::Updated]
            }
            OrderAction::Resend | OrderAction::Delete => &[OrderStatus::Rejected],
            OrderAction::Update => &[OrderStatus::Rejected, OrderStatus::Updated],
        }
    }
}

/// Outcome of a permitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Order moves (or stays) in this status.
    To(OrderStatus),
    /// Order row is removed.
    Delete,
}

/// Decides whether `action` is allowed on an order in `current`.
///
/// Confirming anything other than a pending or updated order is reported as
/// [`CoreError::AlreadyProcessed`]; every other refusal is an
/// [`CoreError::InvalidOrderTransition`].
pub fn transition(order_id: &str, current: OrderStatus, action: OrderAction) -> CoreResult<Transition> {
    if !action.allowed_from().contains(&current) {
        return Err(match action {
            OrderAction::Confirm => CoreError::AlreadyProcessed {
                order_id: order_id.to_string(),
                status: current.to_string(),
            },
            _ => CoreError::InvalidOrderTransition {
                order_id: order_id.to_string(),
                action: action.as_str().to_string(),
                status: current.to_string(),
            },
        });
    }

    Ok(match action {
        OrderAction::Confirm => Transition::To(OrderStatus::Confirmed),
        OrderAction::Reject => Transition::To(OrderStatus::Rejected),
        OrderAction::Resend => Transition::To(OrderStatus::Updated),
        OrderAction::Update => Transition::To(current),
        OrderAction::Delete => Transition::Delete,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderAction::*;
    use OrderStatus::*;

    #[test]
    fn test_happy_paths() {
        assert_eq!(transition("o", Pending, Confirm).unwrap(), Transition::To(Confirmed));
        assert_eq!(transition("o", Pending, Reject).unwrap(), Transition::To(Rejected));
        assert_eq!(transition("o", Rejected, Resend).unwrap(), Transition::To(Updated));
        assert_eq!(transition("o", Updated, Confirm).unwrap(), Transition::To(Confirmed));
        assert_eq!(transition("o", Updated, Reject).unwrap(), Transition::To(Rejected));
        assert_eq!(transition("o", Rejected, Delete).unwrap(), Transition::Delete);
    }

    #[test]
    fn test_update_keeps_status() {
        assert_eq!(transition("o", Rejected, Update).unwrap(), Transition::To(Rejected));
        assert_eq!(transition("o", Updated, Update).unwrap(), Transition::To(Updated));
        assert!(transition("o", Pending, Update).is_err());
    }

    #[test]
    fn test_confirm_twice_is_already_processed() {
        let err = transition("o-1", Confirmed, Confirm).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyProcessed { .. }));

        let err = transition("o-1", Rejected, Confirm).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyProcessed { .. }));
    }

    #[test]
    fn test_confirmed_is_terminal() {
        for action in [Reject, Resend, Update, Delete] {
            let err = transition("o", Confirmed, action).unwrap_err();
            assert!(matches!(err, CoreError::InvalidOrderTransition { .. }));
        }
    }

    #[test]
    fn test_delete_only_from_rejected() {
        for status in [Pending, Updated, Confirmed] {
            assert!(transition("o", status, Delete).is_err());
        }
        assert!(transition("o", Pending, Resend).is_err());
    }
}
