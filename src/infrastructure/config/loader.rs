use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::model::Config;

/// Configuration error types, matched exhaustively by `validate` rather than
/// surfaced as a free-form string.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("invalid rate_limit_per_second: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("invalid poll_interval_secs: {0}. Must be positive")]
    InvalidPollInterval(u64),

    #[error(
        "admission_timeout_secs ({0}) must be greater than poll_interval_secs ({1})"
    )]
    InvalidAdmissionTimeout(u64, u64),

    #[error("bind_address cannot be empty")]
    EmptyBindAddress,

    #[error("configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging, mirroring the precedence
/// used throughout this codebase's config layer: defaults, then project
/// YAML, then a local override file, then environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Config::default()`)
    /// 2. `orchestrator.yaml` (project config)
    /// 3. `orchestrator.local.yaml` (optional dev/test overrides)
    /// 4. Environment variables (`ORCHESTRATOR_` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("orchestrator.yaml"))
            .merge(Yaml::file("orchestrator.local.yaml"))
            .merge(Env::prefixed("ORCHESTRATOR_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the project/local
    /// YAML layers. Used by tests that want a hermetic config.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.image_api.rate_limit_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                config.image_api.rate_limit_per_second,
            ));
        }

        if config.admission.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(
                config.admission.poll_interval_secs,
            ));
        }
        if config.admission.admission_timeout_secs <= config.admission.poll_interval_secs {
            return Err(ConfigError::InvalidAdmissionTimeout(
                config.admission.admission_timeout_secs,
                config.admission.poll_interval_secs,
            ));
        }

        if config.server.bind_address.is_empty() {
            return Err(ConfigError::EmptyBindAddress);
        }

        Ok(())
    }
}
