//! # Store Configuration
//!
//! Tunable business settings for a shop: refund windows, expiry horizon and
//! where the database lives.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DUKA_DB_PATH=/var/lib/duka/duka.db                                 │
//! │     DUKA_ITEM_REFUND_WINDOW_DAYS=10                                    │
//! │     DUKA_SALE_REFUND_WINDOW_DAYS=50                                    │
//! │     DUKA_SOON_EXPIRY_DAYS=180                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ./duka.toml (or the path passed to load)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # duka.toml
//! database_path = "duka.db"
//!
//! [refund]
//! item_window_days = 10
//! sale_window_days = 50
//!
//! [stock]
//! soon_expiry_days = 180
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use duka_core::{RefundPolicy, StockPolicy};

/// Config file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "duka.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Refund windows, measured from the sale date.
    pub refund: RefundPolicy,

    /// Expiry horizon for stock reports.
    pub stock: StockPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("duka.db"),
            refund: RefundPolicy::default(),
            stock: StockPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from config file (if exists)
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if path.exists() {
            info!(?path, "Loading store config from file");
            let contents = std::fs::read_to_string(&path)?;
            config = toml::from_str(&contents)?;
        } else {
            debug!(?path, "Config file not found, using defaults");
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.refund.item_window_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "refund.item_window_days must be greater than 0".into(),
            ));
        }

        if self.refund.sale_window_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "refund.sale_window_days must be greater than 0".into(),
            ));
        }

        if self.stock.soon_expiry_days < 0 {
            return Err(ConfigError::InvalidValue(
                "stock.soon_expiry_days must not be negative".into(),
            ));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("database_path is empty".into()));
        }

        Ok(())
    }

    /// Applies overrides from `lookup` (the process environment in
    /// [`StoreConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DUKA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        if let Some(days) = lookup("DUKA_ITEM_REFUND_WINDOW_DAYS") {
            self.refund.item_window_days = parse_days("DUKA_ITEM_REFUND_WINDOW_DAYS", &days)?;
            debug!(days = self.refund.item_window_days, "Overriding item refund window");
        }

        if let Some(days) = lookup("DUKA_SALE_REFUND_WINDOW_DAYS") {
            self.refund.sale_window_days = parse_days("DUKA_SALE_REFUND_WINDOW_DAYS", &days)?;
            debug!(days = self.refund.sale_window_days, "Overriding sale refund window");
        }

        if let Some(days) = lookup("DUKA_SOON_EXPIRY_DAYS") {
            self.stock.soon_expiry_days = parse_days("DUKA_SOON_EXPIRY_DAYS", &days)?;
        }

        Ok(())
    }
}

fn parse_days(key: &str, value: &str) -> ConfigResult<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue(format!("{key} must be a whole number of days, got '{value}'")))
}
