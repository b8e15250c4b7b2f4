//! Runtime configuration loaded from `quotesync.toml`.
//!
//! Every field has a default, so a missing or partial file is valid. Paths may be
//! overridden with `QUOTESYNC_CONFIG` and `QUOTESYNC_DATA_DIR`.

use crate::logging::default_log_level;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REMOTE_URL: &str = "https://jsonplaceholder.typicode.com/posts";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DB_FILE_NAME: &str = "quotes.sqlite3";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "quotesync", "quotesync")
}

fn default_data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("QUOTESYNC_DATA_DIR") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".quotesync")
}

/// Resolves the configuration file location.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("QUOTESYNC_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("quotesync.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".quotesync.toml")
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub remote_url: String,
    pub interval_secs: u64,
    /// Remote items kept per snapshot; `0` keeps all.
    pub snapshot_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join(DB_FILE_NAME),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: default_data_dir().join("logs"),
        }
    }
}

impl Config {
    /// Loads from [`config_path`].
    pub fn load() -> Self {
        Self::load_from_path(&config_path())
    }

    /// Loads `path`, falling back to defaults on parse failure.
    ///
    /// The normalized config is written back when the file was missing or
    /// normalization changed something.
    pub fn load_from_path(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Failed to parse {path:?}, using defaults: {e}");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        };

        let changed = config.normalize();
        if changed || !path.exists() {
            if let Err(e) = config.save_to_path(path) {
                eprintln!("Failed to write {path:?}: {e}");
            }
        }

        config
    }

    pub fn save_to_path(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    fn normalize(&mut self) -> bool {
        let mut changed = false;

        if self.sync.remote_url.trim().is_empty() {
            self.sync.remote_url = DEFAULT_REMOTE_URL.to_string();
            changed = true;
        }
        if self.sync.interval_secs == 0 {
            self.sync.interval_secs = 1;
            changed = true;
        }
        if self.sync.request_timeout_secs == 0 {
            self.sync.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
            changed = true;
        }

        changed |= normalize_path(&mut self.storage.db_path, || {
            StorageConfig::default().db_path
        });
        changed |= normalize_path(&mut self.logging.dir, || LoggingConfig::default().dir);

        changed
    }
}

fn normalize_path(path: &mut PathBuf, fallback: impl FnOnce() -> PathBuf) -> bool {
    if path.as_os_str().is_empty() {
        *path = fallback();
        return true;
    }
    if path.is_relative() {
        *path = default_data_dir().join(&*path);
        return true;
    }
    false
}
