//! Logging configuration and subscriber initialisation.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the log sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Pretty }
    }
}

impl LoggingConfig {
    /// Build the filter, preferring `RUST_LOG` over the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed (tests and embedded
/// hosts commonly install their own), `true` otherwise.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = config.env_filter();

    let result = match config.format {
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    };

    result.is_ok()
}
