//! Logging configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// How the worker emits logs.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit one JSON object per event instead of text
    #[serde(default)]
    pub json: bool,
}

impl TelemetryConfig {
    /// Filter from `RUST_LOG`, falling back to `log_filter`.
    pub fn env_filter(&self) -> Result<EnvFilter, ValidationError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.log_filter)
                .map_err(|e| ValidationError::InvalidLogFilter(e.to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        EnvFilter::try_new(&self.log_filter)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidLogFilter(e.to_string()))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info,sqlx=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_valid() {
        assert!(TelemetryConfig::default().validate().is_ok());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let config = TelemetryConfig {
            log_filter: "redemption_engine=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidLogFilter(_))));
    }
}
