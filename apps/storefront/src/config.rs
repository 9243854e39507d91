//! # Storefront Configuration
//!
//! Loyalty policy, shipping rates, database location and retry settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BITS_DB_PATH=/var/lib/bits/bits.db                                 │
//! │     BITS_REDEMPTION_MODE=reject                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/bits-store/storefront.toml (Linux)                       │
//! │     ~/Library/Application Support/com.bits.store/storefront.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     1 Bit per 100 spent, 50% cap, clamp, delivery 3990                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "bits.db"
//! max_connections = 5
//!
//! [loyalty]
//! currency_per_point = 100
//! max_redemption_bps = 5000
//! redemption_mode = "clamp"
//!
//! [shipping]
//! pickup_fee = 0
//! delivery_fee = 3990
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 50
//! max_backoff_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bits_core::{LoyaltyPolicy, ShippingRates, ValidationError};
use bits_db::DbConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

/// Failure to load or save configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid loyalty policy: {0}")]
    Policy(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bits.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Retry policy for transient store failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    50
}
fn default_max_backoff() -> u64 {
    1_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        RetrySettings {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete storefront configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub loyalty: LoyaltyPolicy,

    #[serde(default)]
    pub shipping: ShippingRates,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl StorefrontConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                config = Self::from_file(&path)?;
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
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML file without env overrides or validation.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.loyalty.validate()?;

        if self.shipping.pickup_fee < 0 || self.shipping.delivery_fee < 0 {
            return Err(ConfigError::Invalid(
                "shipping fees must not be negative".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `BITS_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BITS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("BITS_CURRENCY_PER_POINT") {
            match value.parse::<i64>() {
                Ok(v) => self.loyalty.currency_per_point = v,
                Err(_) => warn!(value = %value, "Invalid BITS_CURRENCY_PER_POINT"),
            }
        }

        if let Some(value) = lookup("BITS_MAX_REDEMPTION_BPS") {
            match value.parse::<u32>() {
                Ok(v) => self.loyalty.max_redemption_bps = v,
                Err(_) => warn!(value = %value, "Invalid BITS_MAX_REDEMPTION_BPS"),
            }
        }

        if let Some(value) = lookup("BITS_REDEMPTION_MODE") {
            match value.parse() {
                Ok(mode) => {
                    debug!(mode = %value, "Overriding redemption mode from environment");
                    self.loyalty.redemption_mode = mode;
                }
                Err(e) => warn!(value = %value, error = %e, "Invalid BITS_REDEMPTION_MODE"),
            }
        }

        if let Some(value) = lookup("BITS_DELIVERY_FEE") {
            match value.parse::<i64>() {
                Ok(v) => self.shipping.delivery_fee = v,
                Err(_) => warn!(value = %value, "Invalid BITS_DELIVERY_FEE"),
            }
        }
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bits", "store")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bits_core::RedemptionMode;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StorefrontConfig::default();
        assert_eq!(config.loyalty.currency_per_point, 100);
        assert_eq!(config.loyalty.max_redemption_bps, 5_000);
        assert_eq!(config.loyalty.redemption_mode, RedemptionMode::Clamp);
        assert_eq!(config.shipping.delivery_fee, 3_990);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StorefrontConfig = toml::from_str(
            r#"
            [loyalty]
            max_redemption_bps = 3000
            redemption_mode = "reject"

            [shipping]
            delivery_fee = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.loyalty.max_redemption_bps, 3_000);
        assert_eq!(config.loyalty.redemption_mode, RedemptionMode::Reject);
        assert_eq!(config.loyalty.currency_per_point, 100);
        assert_eq!(config.shipping.delivery_fee, 2_500);
        assert_eq!(config.shipping.pickup_fee, 0);
        assert_eq!(config.database.path, PathBuf::from("bits.db"));
    }

    #[test]
    fn test_overrides_win_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("BITS_DB_PATH", "/tmp/bits-test.db"),
            ("BITS_REDEMPTION_MODE", "REJECT"),
            ("BITS_DELIVERY_FEE", "not-a-number"),
            ("BITS_MAX_REDEMPTION_BPS", "2500"),
        ]
        .into_iter()
        .collect();

        let mut config = StorefrontConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/bits-test.db"));
        assert_eq!(config.loyalty.redemption_mode, RedemptionMode::Reject);
        assert_eq!(config.loyalty.max_redemption_bps, 2_500);
        assert_eq!(config.shipping.delivery_fee, 3_990);
    }

    #[test]
    fn test_validation() {
        let mut config = StorefrontConfig::default();
        config.loyalty.currency_per_point = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Policy(_))));

        let mut config = StorefrontConfig::default();
        config.loyalty.max_redemption_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = StorefrontConfig::default();
        config.loyalty.mid_tier_threshold = 20_000;
        assert!(config.validate().is_err());

        let mut config = StorefrontConfig::default();
        config.loyalty.mid_multiplier_bps = 9_000;
        assert!(config.validate().is_err());

        let mut config = StorefrontConfig::default();
        config.shipping.delivery_fee = -1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = StorefrontConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = StorefrontConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[loyalty]"));
        assert!(toml_str.contains("[retry]"));

        let back: StorefrontConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }
}
