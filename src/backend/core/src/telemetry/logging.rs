//! Structured logging with JSON, pretty and compact formats.
//!
//! - JSON format for production environments
//! - Pretty format for development
//! - Per-module log level overrides

use serde::Deserialize;
use std::collections::HashMap;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels, e.g. `saas_core::rbac = "debug"`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default)]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: default_include_target(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_target() -> bool {
    true
}

impl LoggingConfig {
    /// The filter built from `level` plus every module override.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)?;
        for (module, level) in &self.module_levels {
            filter = filter.add_directive(format!("{}={}", module, level).parse()?);
        }
        Ok(filter)
    }

    /// JSON is the default everywhere except development, which gets pretty
    /// output unless a non-default format was chosen.
    pub fn effective_format(&self, environment: &str) -> LogFormat {
        if environment == "development" && self.format == LogFormat::Json {
            LogFormat::Pretty
        } else {
            self.format
        }
    }
}

/// Install the global tracing subscriber.
///
/// Fails if the filter directives do not parse or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig, environment: &str) -> anyhow::Result<()> {
    let filter = config.env_filter()?;

    let base = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.effective_format(environment) {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
        assert!(config.include_target);
    }

    #[test]
    fn test_effective_format() {
        let config = LoggingConfig::default();
        assert_eq!(config.effective_format("development"), LogFormat::Pretty);
        assert_eq!(config.effective_format("production"), LogFormat::Json);

        let compact = LoggingConfig {
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        };
        assert_eq!(compact.effective_format("development"), LogFormat::Compact);
    }

    #[test]
    fn test_module_levels_parse() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("saas_core::rbac".to_string(), "debug".to_string());
        assert!(config.env_filter().is_ok());

        config.module_levels.insert("broken".to_string(), "loud".to_string());
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn test_deserialize_format() {
        let config: LoggingConfig =
            serde_json::from_value(serde_json::json!({"format": "compact", "level": "warn"})).unwrap();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, "warn");
    }
}
