//! Connection configuration
//!
//! Loaded from a JSON file or built in code:
//!
//! ```json
//! {
//!     "db_path": "./data",
//!     "online_remote": "git@example.com:me/data.git",
//!     "encryption_key": "change me",
//!     "durability": "sync",
//!     "commit_timeout_ms": 10000
//! }
//! ```
//!
//! Only `db_path` is required.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DbResult};

/// When a write call returns relative to its commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Return once the block file is written; commit happens in the background
    #[default]
    Async,
    /// Wait for the commit pipeline to acknowledge the write
    Sync,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the database (required)
    pub db_path: PathBuf,

    /// Name used in logs and for the commit worker thread
    #[serde(default = "default_connection_name")]
    pub connection_name: String,

    /// Remote to push to after each commit (optional)
    #[serde(default)]
    pub online_remote: Option<String>,

    /// Passphrase for sensitive records (optional)
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Idle tick of the commit worker, in milliseconds
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    #[serde(default)]
    pub durability: Durability,

    /// Longest a sync write waits for its commit; `None` waits forever
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: Option<u64>,

    /// Commit events automatically (otherwise events are only acknowledged)
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,

    /// Capacity of the commit event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Most events folded into one commit
    #[serde(default = "default_max_commit_batch")]
    pub max_commit_batch: usize,
}

fn default_connection_name() -> String {
    "default".to_string()
}
fn default_sync_interval_ms() -> u64 {
    5_000
}
fn default_commit_timeout_ms() -> Option<u64> {
    Some(30_000)
}
fn default_auto_commit() -> bool {
    true
}
fn default_event_buffer() -> usize {
    256
}
fn default_max_commit_batch() -> usize {
    64
}

impl Config {
    /// Defaults for a database rooted at `db_path`
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            connection_name: default_connection_name(),
            online_remote: None,
            encryption_key: None,
            sync_interval_ms: default_sync_interval_ms(),
            durability: Durability::default(),
            commit_timeout_ms: default_commit_timeout_ms(),
            auto_commit: default_auto_commit(),
            event_buffer: default_event_buffer(),
            max_commit_batch: default_max_commit_batch(),
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> DbResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| DbError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(DbError::Config("db_path must be set".into()));
        }
        if self.connection_name.is_empty() {
            return Err(DbError::Config("connection_name must not be empty".into()));
        }
        if self.event_buffer == 0 {
            return Err(DbError::Config("event_buffer must be > 0".into()));
        }
        if self.max_commit_batch == 0 {
            return Err(DbError::Config("max_commit_batch must be > 0".into()));
        }
        if matches!(self.encryption_key.as_deref(), Some("")) {
            return Err(DbError::Config("encryption_key must not be empty when set".into()));
        }
        if matches!(self.online_remote.as_deref(), Some("")) {
            return Err(DbError::Config("online_remote must not be empty when set".into()));
        }
        Ok(())
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    pub fn with_online_remote(mut self, remote: impl Into<String>) -> Self {
        self.online_remote = Some(remote.into());
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.commit_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_max_commit_batch(mut self, max: usize) -> Self {
        self.max_commit_batch = max;
        self
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(1))
    }

    pub fn commit_timeout(&self) -> Option<Duration> {
        self.commit_timeout_ms.map(Duration::from_millis)
    }

    /// Whether commits are pushed to a remote
    pub fn should_push(&self) -> bool {
        self.online_remote.is_some()
    }
}
