//! Configuration management.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `config/default.toml` and `config/{environment}.toml`, both optional
//! - `SAAS__`-prefixed environment variables, `__` separating sections
//!   (`SAAS__SERVER__PORT=9000`)

use serde::Deserialize;

use crate::rbac::{EvaluationSettings, MissingAttribute, DEFAULT_USER_ID_HEADER};
use crate::telemetry::{LoggingConfig, MetricsConfig};

const ENV_PREFIX: &str = "SAAS";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            authorization: AuthorizationConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How the authenticating gateway hands over the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header holding the authenticated user id
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id_header: default_user_id_header(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationConfig {
    /// `reject` raises an evaluation error, `fail` makes the condition false
    #[serde(default)]
    pub missing_attribute: MissingAttribute,

    /// Refuse to start when the role catalog is inconsistent
    #[serde(default = "default_validate_catalog")]
    pub validate_catalog_on_startup: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            missing_attribute: MissingAttribute::default(),
            validate_catalog_on_startup: default_validate_catalog(),
        }
    }
}

impl AuthorizationConfig {
    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            missing_attribute: self.missing_attribute,
        }
    }
}

// Default value functions
fn default_environment() -> String { "development".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3333 }
fn default_user_id_header() -> String { DEFAULT_USER_ID_HEADER.to_string() }
fn default_validate_catalog() -> bool { true }

impl Config {
    /// Load configuration from config files and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let environment = std::env::var(format!("{}__ENVIRONMENT", ENV_PREFIX))
            .unwrap_or_else(|_| default_environment());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, still honoring environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
