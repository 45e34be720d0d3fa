// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Plain HTTP fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Browser-automation fallback settings
    #[serde(default)]
    pub browser: BrowserFetchOptions,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::config("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::config("fetch.timeout_secs must be > 0"));
        }
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::config("browser.user_agent is empty"));
        }
        if self.browser.timeout_ms == 0 {
            return Err(AppError::config("browser.timeout_ms must be > 0"));
        }
        if self.storage.database_url.trim().is_empty() {
            return Err(AppError::config("storage.database_url is empty"));
        }
        Ok(())
    }
}

/// Plain HTTP client settings for the lightweight fetch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout_secs(),
        }
    }
}

/// Options for the headless-browser fallback fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserFetchOptions {
    /// Run the browser without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Deadline for the page to reach a stable, content-complete state
    #[serde(default = "defaults::browser_timeout_ms")]
    pub timeout_ms: u64,

    /// User agent presented by the browser context
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Extra wait after load for late scripts and redirects
    #[serde(default = "defaults::post_load_wait_ms")]
    pub post_load_wait_ms: u64,
}

impl Default for BrowserFetchOptions {
    fn default() -> Self {
        Self {
            headless: defaults::headless(),
            timeout_ms: defaults::browser_timeout_ms(),
            user_agent: defaults::user_agent(),
            post_load_wait_ms: defaults::post_load_wait_ms(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLx database URL
    #[serde(default = "defaults::database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::database_url(),
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout_secs() -> u64 {
        10
    }
    pub fn headless() -> bool {
        true
    }
    pub fn browser_timeout_ms() -> u64 {
        20_000
    }
    pub fn post_load_wait_ms() -> u64 {
        1_500
    }
    pub fn database_url() -> String {
        "sqlite://fiscal.db?mode=rwc".into()
    }
}
