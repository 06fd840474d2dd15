//! Redemption coordinator configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::StorePolicy;

/// Retry and timeout bounds for the atomic store units.
#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionConfig {
    /// Extra attempts after a storage conflict
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Longest a single store call may take, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl RedemptionConfig {
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy::default()
            .with_max_conflict_retries(self.max_conflict_retries)
            .with_store_timeout(Duration::from_millis(self.store_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.store_timeout_ms == 0 || self.store_timeout_ms > 60_000 {
            return Err(ValidationError::InvalidStoreTimeout);
        }
        if self.max_conflict_retries > 10 {
            return Err(ValidationError::TooManyConflictRetries);
        }
        Ok(())
    }
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_store_timeout_ms() -> u64 {
    5_000
}
