//! Progress configuration structures

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration from `dte.toml` (or the file passed with `--config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Directory backing the durable store (one file per key).
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Delay before a view shows an unlock notification, in milliseconds.
    #[serde(default = "default_notification_delay_ms")]
    pub notification_delay_ms: u64,

    /// Optional JSONL journal of progress events.
    #[serde(default)]
    pub events_log: Option<PathBuf>,

    /// Storage key names
    #[serde(default)]
    pub keys: StorageKeys,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            notification_delay_ms: default_notification_delay_ms(),
            events_log: None,
            keys: StorageKeys::default(),
        }
    }
}

/// Names of the keys the core reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageKeys {
    /// The durable progress record.
    #[serde(default = "default_progress_key")]
    pub progress: String,

    /// Durable seen-flag for the "train unlocked" notification.
    #[serde(default = "default_train_seen_key")]
    pub train_seen: String,

    /// Durable seen-flag for the "execute unlocked" notification.
    #[serde(default = "default_execute_seen_key")]
    pub execute_seen: String,

    /// Session-scoped flag for the discover-entry notification.
    #[serde(default = "default_discover_entry_key")]
    pub discover_entry_seen: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            progress: default_progress_key(),
            train_seen: default_train_seen_key(),
            execute_seen: default_execute_seen_key(),
            discover_entry_seen: default_discover_entry_key(),
        }
    }
}

// Serde default functions
fn default_store_dir() -> PathBuf {
    PathBuf::from(".dte")
}

fn default_notification_delay_ms() -> u64 {
    60
}

fn default_progress_key() -> String {
    "planProgress".to_string()
}

fn default_train_seen_key() -> String {
    "__unlock_train_seen".to_string()
}

fn default_execute_seen_key() -> String {
    "__unlock_execute_seen".to_string()
}

fn default_discover_entry_key() -> String {
    "__train_popup_once".to_string()
}

impl ProgressConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn notification_delay(&self) -> Duration {
        Duration::from_millis(self.notification_delay_ms)
    }
}
