//! Typed configuration.
//!
//! Loads from environment variables or a TOML document. Unset values fall
//! back to defaults; malformed values fail fast.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::Trigger;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Trigger declared on root controls built with
    /// `ControlOptions::from_config`.
    pub default_trigger: Trigger,
    /// Filter directive for [`crate::telemetry::init_telemetry`].
    pub log_level: String,
    /// Compact single-line log output.
    pub compact_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_trigger: Trigger::Change,
            log_level: "info".to_string(),
            compact_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables:
    /// `FORMTREE_TRIGGER`, `FORMTREE_LOG_LEVEL`, `FORMTREE_COMPACT_LOGS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(trigger) = optional_var("FORMTREE_TRIGGER") {
            config.default_trigger = trigger.parse()?;
        }
        if let Some(level) = optional_var("FORMTREE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(compact) = optional_var("FORMTREE_COMPACT_LOGS") {
            config.compact_logs = parse_bool("FORMTREE_COMPACT_LOGS", &compact)?;
        }
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(format!("bad config: {e}")))
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "environment variable {name} must be a boolean, got {other:?}"
        ))),
    }
}
