//! Redemption engine worker.
//!
//! Connects to PostgreSQL, optionally applies migrations, and re-drives
//! pending referral rewards until Ctrl-C.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redemption_engine::adapters::{PostgresReferralStore, PostgresRewardLedger, SystemClock};
use redemption_engine::application::handlers::{ProcessPendingRewardsHandler, RewardProcessor};
use redemption_engine::application::RewardSweeper;
use redemption_engine::config::{AppConfig, ConfigError, TelemetryConfig, ValidationError};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),

    #[error("Sweeper task failed: {0}")]
    Sweeper(#[from] tokio::task::JoinError),
}

fn init_tracing(telemetry: &TelemetryConfig) -> Result<(), ValidationError> {
    let filter = telemetry.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    if telemetry.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.telemetry)?;

    tracing::info!(
        max_connections = config.database.max_connections,
        reward_type = ?config.referral.reward_type,
        "redemption engine starting"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }

    if !config.sweeper.enabled {
        tracing::info!("reward sweeper disabled, nothing to run");
        pool.close().await;
        return Ok(());
    }

    let store = Arc::new(PostgresReferralStore::new(pool.clone()));
    let ledger = Arc::new(PostgresRewardLedger::new(pool.clone()));
    let processor = RewardProcessor::new(store.clone(), ledger, Arc::new(SystemClock));
    let sweeper = RewardSweeper::new(
        ProcessPendingRewardsHandler::new(store, processor),
        config.sweeper.sweeper_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    // The receiver lives until the task ends.
    let _ = shutdown_tx.send(true);
    task.await?;

    pool.close().await;
    tracing::info!("redemption engine stopped");
    Ok(())
}
