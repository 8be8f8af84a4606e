//! # Configuration Management
//!
//! Runtime settings for the crawler and the read-side server. Configuration is a
//! JSON document; every section and field has a default, so a partial file (or
//! no file at all) is valid.
//!
//! - [`IndexConfig`]: where the package index lives and how to talk to it
//! - [`RetryConfig`]: retry budget and backoff for index requests
//! - [`CrawlConfig`]: concurrency and the optional run deadline
//! - [`StorageConfig`]: location of the SQLite database
//! - [`ServerConfig`]: bind address of the listing server
//!
//! ```rust,no_run
//! # use pydeps_crawler::config::Config;
//! let config = Config::load_or_default("pydeps.json")?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub crawl: CrawlConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// Package index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Base URL of the index, without a trailing slash
    pub base_url: String,
    /// Per-request timeout. The bulk listing is tens of megabytes, so keep this generous.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pypi.org".to_string(),
            timeout_secs: 120,
            user_agent: format!("pydeps-crawler/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub backoff_factor_ms: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor_ms: 500,
            max_backoff_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Detail fetches in flight at once
    pub concurrency: usize,
    /// Stop starting new fetches after this many seconds
    pub deadline_secs: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            deadline_secs: None,
        }
    }
}

impl CrawlConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pypi.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid configuration JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when the file
    /// does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.crawl.concurrency == 0 {
            return Err(AppError::Config(
                "crawl.concurrency must be at least 1".to_string(),
            ));
        }
        if self.index.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "index.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if url::Url::parse(&self.index.base_url).is_err() {
            return Err(AppError::Config(format!(
                "index.base_url is not a valid URL: {}",
                self.index.base_url
            )));
        }
        if self.index.timeout_secs == 0 {
            return Err(AppError::Config(
                "index.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
