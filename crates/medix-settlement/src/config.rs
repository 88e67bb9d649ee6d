//! # Settlement Configuration
//!
//! Configuration management for the settlement engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MEDIX_DB_PATH=/var/lib/medix/medix.db                              │
//! │     MEDIX_CHECKOUT_MAX_ATTEMPTS=8                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/medix/medix.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.medix.medix/medix.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # medix.toml
//! [database]
//! path = "/var/lib/medix/medix.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [checkout]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 1000
//! max_invoice_attempts = 5
//! invoice_prefix = "INV"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use medix_db::DbConfig;

use crate::error::{SettlementError, SettlementResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ledger lives and how many connections share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` for a throwaway store.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size. Concurrent checkouts beyond this wait for a connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits on a held lock before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "medix", "medix")
        .map(|dirs| dirs.data_dir().join("medix.db"))
        .unwrap_or_else(|| PathBuf::from("medix.db"))
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Retry and invoice numbering knobs shared by checkout and refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Attempts per operation before giving up with a transient failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff between attempts (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Fresh invoice numbers tried within one attempt on collision.
    #[serde(default = "default_max_invoice_attempts")]
    pub max_invoice_attempts: u32,

    /// Leading segment of generated invoice numbers.
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    1_000
}
fn default_max_invoice_attempts() -> u32 {
    5
}
fn default_invoice_prefix() -> String {
    "INV".to_string()
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_invoice_attempts: default_max_invoice_attempts(),
            invoice_prefix: default_invoice_prefix(),
        }
    }
}

// =============================================================================
// Settlement Config
// =============================================================================

/// Complete settlement configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl SettlementConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (medix.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SettlementResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settlement config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load settlement config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SettlementResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SettlementError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Settlement config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SettlementResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(SettlementError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(SettlementError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.checkout.max_attempts == 0 {
            return Err(SettlementError::Config(
                "checkout.max_attempts must be greater than 0".into(),
            ));
        }

        if self.checkout.max_invoice_attempts == 0 {
            return Err(SettlementError::Config(
                "checkout.max_invoice_attempts must be greater than 0".into(),
            ));
        }

        if self.checkout.initial_backoff_ms > self.checkout.max_backoff_ms {
            return Err(SettlementError::Config(format!(
                "checkout.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.checkout.initial_backoff_ms, self.checkout.max_backoff_ms
            )));
        }

        let prefix = &self.checkout.invoice_prefix;
        let well_formed = !prefix.is_empty()
            && prefix.len() <= 8
            && prefix.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(SettlementError::Config(format!(
                "checkout.invoice_prefix must be 1-8 ASCII letters or digits, got: {}",
                prefix
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MEDIX_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("MEDIX_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid MEDIX_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(attempts) = std::env::var("MEDIX_CHECKOUT_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => {
                    debug!(max_attempts = n, "Overriding checkout attempts from environment");
                    self.checkout.max_attempts = n;
                }
                Err(_) => warn!(value = %attempts, "Ignoring invalid MEDIX_CHECKOUT_MAX_ATTEMPTS"),
            }
        }

        if let Ok(prefix) = std::env::var("MEDIX_INVOICE_PREFIX") {
            self.checkout.invoice_prefix = prefix;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "medix", "medix")
            .map(|dirs| dirs.config_dir().join("medix.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Builds the pool configuration for [`medix_db::Database::new`].
    ///
    /// An in-memory store keeps its single connection whatever
    /// `max_connections` says; each extra connection would see an empty
    /// database.
    pub fn db_config(&self) -> DbConfig {
        let config = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
        };

        config.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Builds the retry policy used by checkout, refund and stock updates.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.checkout.max_attempts,
            initial_backoff: Duration::from_millis(self.checkout.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.checkout.max_backoff_ms),
        }
    }
}
