//! Field indexes with a write-back cache
//!
//! One JSON file per indexed field per dataset maps compound id -> field
//! value. Writes only touch the in-memory cache; `flush` persists every
//! touched file. Once an index file has been loaded into the cache the cache
//! is authoritative for it until the connection closes.
//!
//! Index files are derived data: a missing file reads as empty and an
//! unreadable one is logged and treated as empty. `rebuild` recreates them
//! from block contents.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use crate::errors::{DbError, DbResult};
use crate::observability::Event;
use crate::storage::{to_pretty_json, write_atomic, DbPaths};

/// Contents of one index file: compound id -> indexed value
pub type IndexData = BTreeMap<String, Value>;

/// Per-connection index cache
#[derive(Debug)]
pub struct IndexStore {
    paths: DbPaths,
    cache: RwLock<HashMap<PathBuf, IndexData>>,
    dirty: AtomicBool,
}

impl IndexStore {
    pub fn new(paths: DbPaths) -> Self {
        Self {
            paths,
            cache: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Record the index values of written records.
    ///
    /// `records` pairs each compound id with its field -> value map.
    pub fn update_indexes<'a, I>(&self, dataset: &str, records: I)
    where
        I: IntoIterator<Item = (&'a str, &'a BTreeMap<String, Value>)>,
    {
        let mut cache = self.cache.write();
        for (id, indexes) in records {
            for (field, value) in indexes {
                let file = self.paths.index_file(dataset, field);
                cache
                    .entry(file)
                    .or_insert_with_key(|path| read_index(path))
                    .insert(id.to_string(), value.clone());
            }
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Drop a deleted record from every index of its dataset
    pub fn remove_record(&self, dataset: &str, id: &str) -> DbResult<()> {
        let files = self.index_files(dataset)?;
        let mut cache = self.cache.write();
        for file in files {
            let index = cache.entry(file).or_insert_with_key(|path| read_index(path));
            index.remove(id);
        }
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Load one field index, consulting the cache first.
    ///
    /// Fails with `IndexNotFound` when the field has neither a cached nor an
    /// on-disk index.
    pub fn load(&self, dataset: &str, field: &str) -> DbResult<IndexData> {
        let file = self.paths.index_file(dataset, field);

        if let Some(index) = self.cache.read().get(&file) {
            return Ok(index.clone());
        }

        if !file.exists() {
            return Err(DbError::IndexNotFound {
                dataset: dataset.to_string(),
                field: field.to_string(),
            });
        }

        let mut cache = self.cache.write();
        let index = cache.entry(file).or_insert_with_key(|path| read_index(path));
        Ok(index.clone())
    }

    /// Write every cached index to disk if anything changed.
    ///
    /// Returns whether a flush happened.
    pub fn flush(&self) -> DbResult<bool> {
        let cache = self.cache.read();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        for (file, index) in cache.iter() {
            let result = to_pretty_json(index).and_then(|bytes| write_atomic(file, &bytes));
            if let Err(e) = result {
                error!(event = %Event::IndexFlush, path = %file.display(), error = %e, "failed to write index");
                self.dirty.store(true, Ordering::Release);
                return Err(e);
            }
        }

        debug!(event = %Event::IndexFlush, files = cache.len(), "index flushed");
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Empty every index of a dataset ahead of a rebuild.
    ///
    /// Existing files are kept in the cache as empty maps so the next flush
    /// overwrites them.
    pub fn reset_dataset(&self, dataset: &str) -> DbResult<()> {
        let files = self.index_files(dataset)?;
        let mut cache = self.cache.write();
        for file in files {
            cache.insert(file, IndexData::new());
        }
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    /// Index files of a dataset, cached or on disk
    fn index_files(&self, dataset: &str) -> DbResult<Vec<PathBuf>> {
        let dir = self.paths.index_dir(dataset);
        let mut files: Vec<PathBuf> = self
            .cache
            .read()
            .keys()
            .filter(|path| path.parent() == Some(dir.as_path()))
            .cloned()
            .collect();

        if dir.is_dir() {
            let entries = fs::read_dir(&dir)
                .map_err(|e| DbError::io(format!("read {}", dir.display()), e))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") && !files.contains(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Read an index file. Missing or unreadable files read as empty.
pub fn read_index(path: &Path) -> IndexData {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return IndexData::new(),
        Err(e) => {
            error!(event = %Event::IndexReadFailed, path = %path.display(), error = %e, "index unreadable, treating as empty");
            return IndexData::new();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        error!(event = %Event::IndexReadFailed, path = %path.display(), error = %e, "index unparsable, treating as empty");
        IndexData::new()
    })
}
