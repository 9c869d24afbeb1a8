//! Logging initialization and instrumentation helpers.
//!
//! The library itself only emits `tracing` events and spans and records
//! counters on the global OpenTelemetry meter (a no-op until an application
//! installs a meter provider). [`init_telemetry`] is a convenience for
//! applications and tests that want the events printed.

pub mod metrics;
pub mod validation;

use crate::config::Config;
use crate::error::{Error, Result};

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info",
    /// "formtree=debug").
    pub log_level: String,
    /// Use the compact single-line formatter.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            compact: false,
        }
    }
}

impl From<&Config> for TelemetryConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            compact: config.compact_logs,
        }
    }
}

/// Install a global `tracing` subscriber writing to stderr.
///
/// # Errors
///
/// Returns an error if the filter directive is malformed or a global
/// subscriber was already installed (e.g. by another test in this process).
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::Config(format!("bad log level {:?}: {e}", config.log_level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if config.compact {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    installed.map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))
}
