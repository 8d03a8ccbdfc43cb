//! Application configuration loaded from a TOML file plus environment overrides.

use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::Path;

pub const ENV_DATABASE_URL: &str = "BRANDSCOUT_DATABASE_URL";
pub const ENV_REDDIT_CLIENT_ID: &str = "BRANDSCOUT_REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "BRANDSCOUT_REDDIT_CLIENT_SECRET";
pub const ENV_LLM_API_KEY: &str = "BRANDSCOUT_LLM_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub reddit: RedditConfig,
    pub retry: RetrySettings,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://brandscout.db".to_string(),
            reddit: RedditConfig::default(),
            retry: RetrySettings::default(),
            llm: LlmConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub page_size: u32,
    pub max_pages: u32,
    /// Search window for keywords that have never been scanned.
    pub lookback_hours: u32,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "brandscout/0.1 (opportunity monitor)".to_string(),
            page_size: 100,
            max_pages: 3,
            lookback_hours: 24,
            requests_per_minute: 100,
            burst: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    None,
    OpenAi,
    Claude,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_words: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::None,
            api_key: None,
            model: None,
            base_url: None,
            max_words: 120,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_secs: u64,
    pub max_concurrent_scans: usize,
    pub per_brand_query_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: 60,
            max_concurrent_scans: 4,
            per_brand_query_concurrency: 3,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if it exists, falls back to defaults otherwise, then
    /// applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content).map_err(ConfigError::Parse)?
            }
            Some(path) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into())
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(id) = lookup(ENV_REDDIT_CLIENT_ID) {
            self.reddit.client_id = Some(id);
        }
        if let Some(secret) = lookup(ENV_REDDIT_CLIENT_SECRET) {
            self.reddit.client_secret = Some(secret);
        }
        if let Some(key) = lookup(ENV_LLM_API_KEY) {
            self.llm.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database_url".to_string(),
            });
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        if !(1..=100).contains(&self.reddit.page_size) {
            return Err(ConfigError::invalid("reddit.page_size", self.reddit.page_size));
        }
        if self.reddit.max_pages == 0 {
            return Err(ConfigError::invalid("reddit.max_pages", self.reddit.max_pages));
        }
        if self.reddit.requests_per_minute == 0 || self.reddit.burst == 0 {
            return Err(ConfigError::invalid(
                "reddit.requests_per_minute",
                self.reddit.requests_per_minute,
            ));
        }
        if self.retry.max_attempts == 0 || self.retry.max_attempts > 10 {
            return Err(ConfigError::invalid("retry.max_attempts", self.retry.max_attempts));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::invalid("retry.jitter_factor", self.retry.jitter_factor));
        }
        if self.scheduler.max_concurrent_scans == 0 {
            return Err(ConfigError::invalid(
                "scheduler.max_concurrent_scans",
                self.scheduler.max_concurrent_scans,
            ));
        }
        if self.scheduler.per_brand_query_concurrency == 0 {
            return Err(ConfigError::invalid(
                "scheduler.per_brand_query_concurrency",
                self.scheduler.per_brand_query_concurrency,
            ));
        }
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.tick_interval_secs",
                self.scheduler.tick_interval_secs,
            ));
        }
        if self.llm.provider != LlmProviderKind::None && self.llm.api_key.is_none() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: ENV_LLM_API_KEY.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.max_concurrent_scans, 4);
        assert_eq!(config.llm.provider, LlmProviderKind::None);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = AppConfig::from_toml_str(
            r#"
            database_url = "sqlite:///var/lib/brandscout.db"

            [reddit]
            client_id = "abc"
            client_secret = "shh"
            max_pages = 2

            [scheduler]
            max_concurrent_scans = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url, "sqlite:///var/lib/brandscout.db");
        assert_eq!(config.reddit.client_id.as_deref(), Some("abc"));
        assert_eq!(config.reddit.max_pages, 2);
        assert_eq!(config.reddit.page_size, 100);
        assert_eq!(config.scheduler.max_concurrent_scans, 8);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml_str("[reddit]\npage_size = 500\n");
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));

        let result = AppConfig::from_toml_str("[llm]\nprovider = \"openai\"\n");
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::MissingEnvironmentVariable { .. }))
        ));

        let result = AppConfig::from_toml_str("[scheduler]\nmax_concurrent_scans = \"many\"\n");
        assert!(matches!(result, Err(CoreError::Config(ConfigError::Parse(_)))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|name| match name {
            ENV_REDDIT_CLIENT_ID => Some("from-env".to_string()),
            ENV_LLM_API_KEY => Some("sk-test".to_string()),
            _ => None,
        });
        assert_eq!(config.reddit.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.database_url, "sqlite://brandscout.db");
    }
}
