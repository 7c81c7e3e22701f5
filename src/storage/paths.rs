//! On-disk layout
//!
//! ```text
//! <root>/<dataset>/<block>.json          block files
//! <root>/.index/<dataset>/<field>.json   index files
//! ```
//!
//! Directories starting with `.` are never datasets.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{DbError, DbResult};

/// Block file extension
pub const BLOCK_EXT: &str = "json";

/// Index directory name under the db root
pub const INDEX_DIR: &str = ".index";

/// Path builder rooted at the db directory
#[derive(Debug, Clone)]
pub struct DbPaths {
    root: PathBuf,
}

impl DbPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    pub fn block_file(&self, dataset: &str, block: &str) -> PathBuf {
        self.dataset_dir(dataset)
            .join(format!("{}.{}", block, BLOCK_EXT))
    }

    pub fn index_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(INDEX_DIR).join(dataset)
    }

    pub fn index_file(&self, dataset: &str, field: &str) -> PathBuf {
        self.index_dir(dataset).join(format!("{}.json", field))
    }

    /// Path relative to the root, for commit messages
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Names of every dataset directory, sorted
    pub fn datasets(&self) -> DbResult<Vec<String>> {
        let mut names = Vec::new();
        if !self.root.is_dir() {
            return Ok(names);
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| DbError::io(format!("read {}", self.root.display()), e))?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    /// Block files of a dataset, sorted by name
    pub fn block_files(&self, dataset: &str) -> DbResult<Vec<PathBuf>> {
        let dir = self.dataset_dir(dataset);
        if !dir.is_dir() {
            return Err(DbError::DatasetNotFound(dataset.to_string()));
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DbError::io(format!("read {}", dir.display()), e))?;
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(BLOCK_EXT)
            })
            .collect();

        files.sort();
        Ok(files)
    }
}

/// Block name from a block file path
pub fn block_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
