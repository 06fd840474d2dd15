//! RewardSweeper - Background re-drive of unprocessed referral rewards.
//!
//! Conversion applies its reward right after commit. When that fails the
//! reward row stays pending and this service picks it up on a later tick.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 30s | How often to look for pending rewards |
//! | `batch_size` | 100 | Max rewards to process per tick |
//!
//! ## Graceful Shutdown
//!
//! The service listens for a shutdown signal and finishes the current
//! batch before stopping.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::handlers::{
    ProcessPendingRewardsCommand, ProcessPendingRewardsHandler, ProcessPendingRewardsResult,
};
use crate::domain::redemption::RedemptionError;

/// Configuration for the RewardSweeper service.
#[derive(Debug, Clone)]
pub struct RewardSweeperConfig {
    /// How often to sweep.
    pub interval: Duration,

    /// Maximum rewards to process per sweep.
    pub batch_size: u32,
}

impl Default for RewardSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

impl RewardSweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }
}

/// Background service that processes pending rewards.
pub struct RewardSweeper {
    handler: ProcessPendingRewardsHandler,
    config: RewardSweeperConfig,
}

impl RewardSweeper {
    pub fn new(handler: ProcessPendingRewardsHandler, config: RewardSweeperConfig) -> Self {
        Self { handler, config }
    }

    /// Run the sweep loop until the shutdown signal is received.
    ///
    /// A failed sweep is logged and the loop keeps going; the store being
    /// briefly unreachable must not stop reward delivery for good.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "reward sweeper started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.sweep_logged().await;
                        tracing::info!("reward sweeper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.sweep_logged().await;
                }
            }
        }
    }

    /// Process a single batch of pending rewards.
    pub async fn sweep_once(&self) -> Result<ProcessPendingRewardsResult, RedemptionError> {
        self.handler
            .handle(ProcessPendingRewardsCommand {
                limit: self.config.batch_size,
            })
            .await
    }

    async fn sweep_logged(&self) {
        match self.sweep_once().await {
            Ok(result) if result.processed > 0 || result.failed > 0 => {
                tracing::info!(processed = result.processed, failed = result.failed, "reward sweep finished");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "reward sweep failed");
            }
        }
    }
}
