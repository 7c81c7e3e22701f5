//! Read-only dataset view for dashboards and tooling
//!
//! Loads every block of a dataset and keeps track of what could not be read.
//! Nothing here writes to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use super::block::load_block;
use super::paths::{block_name, DbPaths};
use super::record::Envelope;
use crate::crypto::Cipher;
use crate::errors::{DbError, DbResult};
use crate::observability::Event;

/// Maximum characters shown per table cell
pub const TABLE_CELL_WIDTH: usize = 40;

/// A readable block and its decoded records
#[derive(Debug, Clone)]
pub struct BlockView {
    pub name: String,
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    pub records: Vec<(String, Envelope)>,
}

impl BlockView {
    pub fn human_size(&self) -> String {
        format_bytes(self.size)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Tabular projection of the record data.
    ///
    /// Headers are the sorted keys of the first record.
    pub fn table(&self) -> Table {
        let mut table = Table::default();

        for (i, (_, envelope)) in self.records.iter().enumerate() {
            let fields: BTreeMap<String, Value> = match &envelope.data {
                Value::Object(map) => map.clone().into_iter().collect(),
                _ => BTreeMap::new(),
            };

            if i == 0 {
                table.headers = fields.keys().cloned().collect();
            }

            let row = table
                .headers
                .iter()
                .map(|key| cell(fields.get(key)))
                .collect();
            table.rows.push(row);
        }

        table
    }
}

/// Headers and rows of a block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// All blocks of one dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub path: PathBuf,
    pub blocks: Vec<BlockView>,
    /// Block files that could not be parsed
    pub bad_blocks: Vec<PathBuf>,
    /// Records that could not be decoded
    pub bad_records: Vec<String>,
}

impl Dataset {
    /// Load a dataset, skipping past bad blocks and bad records
    pub fn load(paths: &DbPaths, name: &str, cipher: Option<&Cipher>) -> DbResult<Self> {
        let mut dataset = Self {
            name: name.to_string(),
            path: paths.dataset_dir(name),
            blocks: Vec::new(),
            bad_blocks: Vec::new(),
            bad_records: Vec::new(),
        };

        for path in paths.block_files(name)? {
            let block = match load_block(&path, name) {
                Ok(block) => block,
                Err(DbError::BadBlock { path, reason }) => {
                    warn!(event = %Event::BadBlock, path = %path.display(), reason = %reason, "skipping unreadable block");
                    dataset.bad_blocks.push(path);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let decoded = block.decode_all(cipher);
            dataset.bad_records.extend(decoded.bad_records);

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            dataset.blocks.push(BlockView {
                name: block_name(&path),
                path,
                size,
                records: decoded.records,
            });
        }

        Ok(dataset)
    }

    pub fn block(&self, name: &str) -> Option<&BlockView> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn record_count(&self) -> usize {
        self.blocks.iter().map(BlockView::record_count).sum()
    }

    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }

    pub fn human_size(&self) -> String {
        format_bytes(self.size())
    }
}

/// Load every dataset under the db root
pub fn load_datasets(paths: &DbPaths, cipher: Option<&Cipher>) -> DbResult<Vec<Dataset>> {
    paths
        .datasets()?
        .iter()
        .map(|name| Dataset::load(paths, name, cipher))
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    text.chars().take(TABLE_CELL_WIDTH).collect()
}

const KB: u64 = 1 << 10;
const MB: u64 = 1 << 20;
const GB: u64 = 1 << 30;
const TB: u64 = 1 << 40;

/// Human readable size, e.g. `1.5KB`, `2MB`
pub fn format_bytes(bytes: u64) -> String {
    let (value, unit) = match bytes {
        0 => return "0".to_string(),
        b if b >= TB => (b as f64 / TB as f64, "TB"),
        b if b >= GB => (b as f64 / GB as f64, "GB"),
        b if b >= MB => (b as f64 / MB as f64, "MB"),
        b if b >= KB => (b as f64 / KB as f64, "KB"),
        b => (b as f64, "B"),
    };

    let text = format!("{:.1}", value);
    format!("{}{}", text.trim_end_matches(".0"), unit)
}
