use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::digest::SortOrder;
use crate::error::{AppError, Result};
use crate::feed::{FetchSettings, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed list: local path or http(s) URL; plain text or OPML.
    pub sources: String,
    /// Where the JSON digest is read from and written to.
    pub output_path: PathBuf,
    /// Substituted for missing or unreachable avatars.
    pub default_avatar: String,
    /// Maximum concurrent feed fetches.
    pub capacity: usize,
    /// Budget for the whole run.
    pub deadline_secs: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    pub sort_order: SortOrder,
    pub published_format: String,
    pub updated_format: String,
    pub hardened_user_agent: String,
    pub liveness_timeout_secs: u64,
    pub liveness_get_fallback: bool,
    pub log_file: Option<PathBuf>,
    /// JSON array of articles merged into every digest; path or http(s) URL.
    pub pinned: Option<String>,
    /// Feed title -> display name.
    pub blog_names: HashMap<String, String>,
    /// Site host -> avatar URL.
    pub avatar_overrides: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: "feeds.txt".to_string(),
            output_path: PathBuf::from("data.json"),
            default_avatar: String::new(),
            capacity: 10,
            deadline_secs: 180,
            request_timeout_secs: 15,
            retry: RetryConfig::default(),
            sort_order: SortOrder::Descending,
            published_format: "%d %b %Y".to_string(),
            updated_format: "%Y-%m-%d %H:%M:%S".to_string(),
            hardened_user_agent: FetchSettings::default().hardened_user_agent,
            liveness_timeout_secs: 5,
            liveness_get_fallback: false,
            log_file: None,
            pinned: None,
            blog_names: HashMap::new(),
            avatar_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_wait_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_wait_ms: 1000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_wait: Duration::from_millis(self.base_wait_ms),
            multiplier: self.multiplier,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. Only a
    /// missing default file falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("feedroll").join("config.toml"))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(sources) = lookup("FEEDROLL_SOURCES") {
            self.sources = sources;
        }
        if let Some(output) = lookup("FEEDROLL_OUTPUT") {
            self.output_path = PathBuf::from(output);
        }
        if let Some(avatar) = lookup("FEEDROLL_DEFAULT_AVATAR") {
            self.default_avatar = avatar;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(AppError::Config("capacity must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(AppError::Config("retry.multiplier must be a finite number >= 1".into()));
        }
        for (name, format) in [
            ("published_format", &self.published_format),
            ("updated_format", &self.updated_format),
        ] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(AppError::Config(format!("{name} is not a valid strftime format")));
            }
        }
        if self.sources.trim().is_empty() {
            return Err(AppError::Config("sources must not be empty".into()));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            hardened_user_agent: self.hardened_user_agent.clone(),
        }
    }
}
