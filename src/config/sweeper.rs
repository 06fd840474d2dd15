//! Reward sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::RewardSweeperConfig;

/// Background re-drive of pending referral rewards.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Rewards processed per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl SweeperConfig {
    pub fn sweeper_config(&self) -> RewardSweeperConfig {
        RewardSweeperConfig::default()
            .with_interval(Duration::from_secs(self.interval_secs))
            .with_batch_size(self.batch_size)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    100
}
