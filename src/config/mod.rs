//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `REDEMPTION` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use redemption_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Sweeping every {}s", config.sweeper.interval_secs);
//! ```

mod database;
mod error;
mod redemption;
mod referral;
mod sweeper;
mod telemetry;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use redemption::RedemptionConfig;
pub use referral::{ReferralConfig, RewardType};
pub use sweeper::SweeperConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Conflict retries and store timeout
    #[serde(default)]
    pub redemption: RedemptionConfig,

    /// Referral codes, invitations and rewards
    #[serde(default)]
    pub referral: ReferralConfig,

    /// Pending reward re-drive
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Log filter and format
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `REDEMPTION` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `REDEMPTION__DATABASE__URL=...` -> `database.url = ...`
    /// - `REDEMPTION__REFERRAL__REWARD_TYPE=FREE_COURSE` -> `referral.reward_type`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("REDEMPTION")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first section that is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redemption.validate()?;
        self.referral.validate()?;
        self.sweeper.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}
