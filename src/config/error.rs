//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Store timeout must be between 1 and 60000 ms")]
    InvalidStoreTimeout,

    #[error("Conflict retries must not exceed 10")]
    TooManyConflictRetries,

    #[error("Invalid referral code prefix: {0}")]
    InvalidCodePrefix(String),

    #[error("Invitations per request must be between 1 and 500")]
    InvalidInvitationLimit,

    #[error("Invalid referral reward: {0}")]
    InvalidReward(String),

    #[error("Sweep interval must be at least one second")]
    InvalidSweepInterval,

    #[error("Sweep batch size must be between 1 and 10000")]
    InvalidBatchSize,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
