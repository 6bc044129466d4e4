//! Configuration management for the CLI

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration, stored as JSON in the user's config directory
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API endpoint the token was issued by
    pub api_url: Option<String>,
    /// Access token from the last `vitals login`
    pub access_token: Option<String>,
    pub username: Option<String>,
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Token to use against `api_url`, if one was issued there
    pub fn token_for(&self, api_url: &str) -> Option<&str> {
        match self.api_url.as_deref() {
            Some(url) if url == api_url => self.access_token.as_deref(),
            _ => None,
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("vitals").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vitals").join("config.json");

        let config = Config {
            api_url: Some("http://localhost:5000".to_string()),
            access_token: Some("token".to_string()),
            username: Some("admin".to_string()),
            logged_in_at: Some(Utc::now()),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_token_scoped_to_api_url() {
        let config = Config {
            api_url: Some("http://localhost:5000".to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        };

        assert_eq!(config.token_for("http://localhost:5000"), Some("token"));
        assert_eq!(config.token_for("http://other:5000"), None);
    }
}
