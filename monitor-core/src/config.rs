//! Application configuration.
//!
//! Settings come from an optional TOML file; every field has a default so
//! an absent file yields a usable local setup. A handful of environment
//! variables override the file, mainly for credentials.

use crate::error::{ConfigError, CoreError};
use crate::query::{PAGE_SIZE_MAX, PAGE_SIZE_MIN, PAGE_SIZE_STEP};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_DATABASE_URL: &str = "REDDIT_MONITOR_DATABASE_URL";
pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_IDENTITY_SECRET: &str = "REDDIT_MONITOR_IDENTITY_SECRET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub reddit: RedditSettings,
    pub ingestion: IngestionSettings,
    pub dashboard: DashboardSettings,
    pub identity: IdentitySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://reddit_monitor.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: format!("reddit-monitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub keyword_refresh_secs: u64,
    pub idle_wait_secs: u64,
    pub reconnect_backoff_secs: u64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            keyword_refresh_secs: 300,
            idle_wait_secs: 60,
            reconnect_backoff_secs: 60,
        }
    }
}

impl IngestionSettings {
    pub fn keyword_refresh(&self) -> Duration {
        Duration::from_secs(self.keyword_refresh_secs)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub default_page_size: u32,
    pub lookback_days: u32,
    pub auto_refresh_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            default_page_size: crate::query::DEFAULT_PAGE_SIZE,
            lookback_days: 7,
            auto_refresh_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub path: PathBuf,
    pub secret: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reddit_monitor_identity.json"),
            secret: "change-me-reddit-monitor-identity".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists, falls back to defaults otherwise, then
    /// applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml(&raw)?
        } else {
            debug!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies overrides from `lookup`; kept separate from `std::env` so
    /// tests can feed a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(id) = lookup(ENV_CLIENT_ID) {
            self.reddit.client_id = Some(id);
        }
        if let Some(secret) = lookup(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = Some(secret);
        }
        if let Some(agent) = lookup(ENV_USER_AGENT) {
            self.reddit.user_agent = agent;
        }
        if let Some(secret) = lookup(ENV_IDENTITY_SECRET) {
            self.identity.secret = secret;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "0"));
        }

        let page_size = self.dashboard.default_page_size;
        if !(PAGE_SIZE_MIN..=PAGE_SIZE_MAX).contains(&page_size) || page_size % PAGE_SIZE_STEP != 0
        {
            return Err(invalid("dashboard.default_page_size", &page_size.to_string()));
        }

        for (field, value) in [
            ("ingestion.keyword_refresh_secs", self.ingestion.keyword_refresh_secs),
            ("ingestion.idle_wait_secs", self.ingestion.idle_wait_secs),
            ("ingestion.reconnect_backoff_secs", self.ingestion.reconnect_backoff_secs),
            ("dashboard.auto_refresh_secs", self.dashboard.auto_refresh_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "0"));
            }
        }

        if self.identity.secret.is_empty() {
            return Err(ConfigError::InvalidIdentitySecret);
        }
        Ok(())
    }

    /// Reddit credentials, required only by the ingestion command.
    pub fn reddit_credentials(&self) -> Result<(String, String), ConfigError> {
        let client_id = self
            .reddit
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: ENV_CLIENT_ID.to_string(),
            })?;
        let client_secret = self
            .reddit
            .client_secret
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: ENV_CLIENT_SECRET.to_string(),
            })?;
        Ok((client_id, client_secret))
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingestion.keyword_refresh(), Duration::from_secs(300));
        assert_eq!(config.ingestion.reconnect_backoff(), Duration::from_secs(60));
        assert_eq!(config.dashboard.default_page_size, 20);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "sqlite:///tmp/monitor.db"

            [ingestion]
            keyword_refresh_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url, "sqlite:///tmp/monitor.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ingestion.keyword_refresh_secs, 120);
        assert_eq!(config.ingestion.idle_wait_secs, 60);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("[database\nurl = 1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite://override.db"),
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.database.url, "sqlite://override.db");
        assert_eq!(
            config.reddit_credentials().unwrap(),
            ("id".to_string(), "secret".to_string())
        );
    }

    #[test]
    fn test_missing_credentials() {
        let config = AppConfig::default();
        assert!(matches!(
            config.reddit_credentials(),
            Err(ConfigError::MissingEnvironmentVariable { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_page_size() {
        let mut config = AppConfig::default();
        config.dashboard.default_page_size = 15;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.dashboard.default_page_size = 110;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.ingestion.reconnect_backoff_secs = 0;
        assert!(config.validate().is_err());
    }
}
