//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gitdb::{BaseModel, CommitBackend, Config, GitDb, Model, NoopBackend, Schema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;

pub const DATASET: &str = "Booking";
pub const BLOCK: &str = "202401";

/// Test model indexed on room type and guest count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(flatten)]
    pub base: BaseModel,
    pub key: String,
    pub block: String,
    pub room_type: String,
    pub guests: u32,
    #[serde(default)]
    pub sensitive: bool,
}

impl Booking {
    pub fn new(key: &str, room_type: &str, guests: u32) -> Self {
        Self {
            base: BaseModel::default(),
            key: key.to_string(),
            block: BLOCK.to_string(),
            room_type: room_type.to_string(),
            guests,
            sensitive: false,
        }
    }

    pub fn in_block(mut self, block: &str) -> Self {
        self.block = block.to_string();
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl Model for Booking {
    fn schema(&self) -> Schema {
        let mut indexes = BTreeMap::new();
        indexes.insert("RoomType".to_string(), json!(self.room_type));
        indexes.insert("Guests".to_string(), json!(self.guests));
        Schema::new(DATASET, self.block.clone(), self.key.clone(), indexes)
    }

    fn base(&self) -> &BaseModel {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseModel {
        &mut self.base
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.key.is_empty() {
            problems.push("key is required".to_string());
        }
        if self.guests == 0 {
            problems.push("guests must be at least 1".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    fn should_encrypt(&self) -> bool {
        self.sensitive
    }
}

/// Config with a short idle tick so tests do not wait on the worker
pub fn test_config(root: &Path) -> Config {
    Config::new(root).with_sync_interval(Duration::from_millis(20))
}

pub fn open_db() -> (TempDir, GitDb) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let db = GitDb::open(test_config(temp.path()), Arc::new(NoopBackend)).unwrap();
    (temp, db)
}

pub fn open_with(config: Config, backend: Arc<dyn CommitBackend>) -> GitDb {
    GitDb::open(config, backend).unwrap()
}

pub fn block_path(root: &Path, block: &str) -> std::path::PathBuf {
    root.join(DATASET).join(format!("{}.json", block))
}
