//! # Configuration Management Module
//!
//! Scriptle reads a single TOML file. Every section has defaults, so a file
//! only needs the values it changes.
//!
//! - [`AppConfig`] - app name, fallback pack and community
//! - [`StorageConfig`] - stats database and local storage file
//! - [`PuzzleConfig`] - puzzle data directory and generation window
//! - [`SchedulerConfig`] - the daily post job
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ```toml
//! [app]
//! name = "Scriptle"
//! default_pack = "shrek"
//!
//! [storage]
//! db_path = "./data/db"
//! local_storage_file = "./data/local-storage.json"
//!
//! [puzzles]
//! data_dir = "public/data"
//! days = 365
//!
//! [scheduler]
//! enabled = true
//! post_hour_utc = 0
//! packs = ["shrek"]
//! ```
//!
//! ```rust,no_run
//! use scriptle::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("scriptle.toml").await?;
//!     println!("default pack: {}", config.app.default_pack);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub puzzles: PuzzleConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    /// Pack served when a post has no stored puzzle config.
    pub default_pack: String,
    /// Community used for stats when a request does not carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_community: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Scriptle".to_string(),
            default_pack: "shrek".to_string(),
            default_community: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Sled directory for stats, posts and mirrored user storage.
    pub db_path: String,
    /// JSON file standing in for browser local storage in the CLI.
    pub local_storage_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/db".to_string(),
            local_storage_file: "./data/local-storage.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PuzzleConfig {
    pub data_dir: String,
    /// Days generated after the start date.
    pub days: u32,
    /// Where `themes.js` is written.
    pub themes_file: String,
    /// Minimum words per line used by `pack coverage`.
    pub min_words: usize,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            data_dir: "public/data".to_string(),
            days: 365,
            themes_file: "public/themes.js".to_string(),
            min_words: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// UTC hour (0-23) at which the daily post is created.
    pub post_hour_utc: u32,
    /// Packs that get a daily post. Empty means the default pack only.
    pub packs: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post_hour_utc: 0,
            packs: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Configured hour, falling back to midnight when out of range.
    pub fn post_hour(&self) -> u32 {
        if self.post_hour_utc < 24 {
            self.post_hour_utc
        } else {
            log::warn!(
                "Invalid scheduler post_hour_utc {}, defaulting to 0",
                self.post_hour_utc
            );
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_ascii_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" | "warning" => log::LevelFilter::Warn,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        Self::from_toml(&content).map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;
        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;
        Ok(())
    }

    /// Packs the daily job posts for.
    pub fn scheduled_packs(&self) -> Vec<String> {
        if self.scheduler.packs.is_empty() {
            vec![self.app.default_pack.clone()]
        } else {
            self.scheduler.packs.clone()
        }
    }
}
