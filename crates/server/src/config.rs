//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Signing key used when none is configured; never suitable for deployment
pub const DEVELOPMENT_JWT_SECRET: &str = "vitals-development-secret";

/// Server configuration, read from `VITALS_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port of the query API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between generated readings
    #[serde(default = "default_generator_interval")]
    pub generator_interval_secs: u64,

    /// Entries kept per history
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// `.onnx` model or `.json` linear weights
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_readings_log_path")]
    pub readings_log_path: PathBuf,

    #[serde(default = "default_auth_username")]
    pub auth_username: String,

    #[serde(default = "default_auth_password")]
    pub auth_password: String,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,

    /// Fixed seed for reproducible readings
    #[serde(default)]
    pub generator_seed: Option<u64>,
}

fn default_api_port() -> u16 {
    5000
}

fn default_generator_interval() -> u64 {
    10
}

fn default_buffer_capacity() -> usize {
    vitals_pipeline::buffer::DEFAULT_CAPACITY
}

fn default_mailbox_capacity() -> usize {
    vitals_pipeline::bus::DEFAULT_MAILBOX_CAPACITY
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/efficiency.onnx")
}

fn default_readings_log_path() -> PathBuf {
    PathBuf::from("data/readings.json")
}

fn default_auth_username() -> String {
    "admin".to_string()
}

fn default_auth_password() -> String {
    "password".to_string()
}

fn default_jwt_secret() -> String {
    std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| DEVELOPMENT_JWT_SECRET.to_string())
}

fn default_token_ttl() -> i64 {
    vitals_pipeline::auth::DEFAULT_TOKEN_TTL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            generator_interval_secs: default_generator_interval(),
            buffer_capacity: default_buffer_capacity(),
            mailbox_capacity: default_mailbox_capacity(),
            model_path: default_model_path(),
            readings_log_path: default_readings_log_path(),
            auth_username: default_auth_username(),
            auth_password: default_auth_password(),
            jwt_secret: default_jwt_secret(),
            token_ttl_secs: default_token_ttl(),
            generator_seed: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// Unparseable values are an error rather than silently defaulted.
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("VITALS").try_parsing(true))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.generator_interval_secs > 0, "generator_interval_secs must be positive");
        anyhow::ensure!(self.buffer_capacity > 0, "buffer_capacity must be positive");
        anyhow::ensure!(self.mailbox_capacity > 0, "mailbox_capacity must be positive");
        anyhow::ensure!(self.token_ttl_secs > 0, "token_ttl_secs must be positive");
        Ok(())
    }

    pub fn generator_interval(&self) -> Duration {
        Duration::from_secs(self.generator_interval_secs)
    }

    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("VITALS")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_source(env(&[])).unwrap();
        assert_eq!(config.api_port, 5000);
        assert_eq!(config.generator_interval(), Duration::from_secs(10));
        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.token_ttl_secs, 900);
        assert_eq!(config.auth_username, "admin");
        assert_eq!(config.model_path, PathBuf::from("models/efficiency.onnx"));
        assert!(config.generator_seed.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServerConfig::from_source(env(&[
            ("VITALS_API_PORT", "8081"),
            ("VITALS_GENERATOR_SEED", "42"),
            ("VITALS_MODEL_PATH", "weights.json"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 8081);
        assert_eq!(config.generator_seed, Some(42));
        assert_eq!(config.model_path, PathBuf::from("weights.json"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ServerConfig::from_source(env(&[("VITALS_API_PORT", "not-a-port")])).is_err());
        assert!(ServerConfig::from_source(env(&[("VITALS_BUFFER_CAPACITY", "0")])).is_err());
    }
}
