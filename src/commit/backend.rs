//! Commit backend
//!
//! The version-control collaborator. A backend either fully commits the
//! current on-disk state of the given path or returns an error; it never
//! commits partially.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::errors::{DbError, DbResult};

/// Version-control driver used by the commit worker
pub trait CommitBackend: Send + Sync {
    /// Commit the current state of `path` with `message`
    fn commit(&self, message: &str, path: &Path) -> DbResult<()>;

    /// Synchronize with the remote
    fn push(&self) -> DbResult<()> {
        Ok(())
    }
}

/// Backend that accepts everything and records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl CommitBackend for NoopBackend {
    fn commit(&self, _message: &str, _path: &Path) -> DbResult<()> {
        Ok(())
    }
}

/// One commit accepted by [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub message: String,
    pub path: PathBuf,
}

/// Recording backend with failure injection, for tests and embedders
#[derive(Debug, Default)]
pub struct MemoryBackend {
    commits: Mutex<Vec<CommitEntry>>,
    pushes: Mutex<usize>,
    fail_commits: AtomicBool,
    fail_pushes: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> Vec<CommitEntry> {
        self.commits.lock().clone()
    }

    /// All committed messages, one line per event
    pub fn messages(&self) -> Vec<String> {
        self.commits
            .lock()
            .iter()
            .flat_map(|c| c.message.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    pub fn push_count(&self) -> usize {
        *self.pushes.lock()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Make every commit take at least `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }
}

impl CommitBackend for MemoryBackend {
    fn commit(&self, message: &str, path: &Path) -> DbResult<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(DbError::CommitFailed("injected commit failure".into()));
        }

        self.commits.lock().push(CommitEntry {
            message: message.to_string(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn push(&self) -> DbResult<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(DbError::CommitFailed("injected push failure".into()));
        }
        *self.pushes.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_records() {
        let backend = MemoryBackend::new();
        backend.commit("Inserting a into b\nUpdating c in b", Path::new("/db/b.json")).unwrap();
        backend.push().unwrap();

        assert_eq!(backend.commits().len(), 1);
        assert_eq!(backend.messages().len(), 2);
        assert_eq!(backend.push_count(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.fail_commits(true);
        backend.fail_pushes(true);

        assert!(backend.commit("m", Path::new("/p")).is_err());
        assert!(backend.push().is_err());
        assert!(backend.commits().is_empty());

        backend.fail_commits(false);
        assert!(backend.commit("m", Path::new("/p")).is_ok());
    }
}
