//! Metrics registry for gitdb
//!
//! - Counters only, monotonic
//! - Reset only when a connection is opened
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one connection.
///
/// Relaxed ordering is enough: counters are read for reporting only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Records written for the first time
    inserts: AtomicU64,
    /// Records replaced in place
    updates: AtomicU64,
    deletes: AtomicU64,
    /// Writes deferred to the write queue
    queued_writes: AtomicU64,
    /// Commit batches accepted by the backend
    commits: AtomicU64,
    /// Commit batches rejected by the backend
    commit_failures: AtomicU64,
    /// Successful remote synchronizations
    pushes: AtomicU64,
    bad_blocks: AtomicU64,
    bad_records: AtomicU64,
    index_flushes: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queued_writes(&self) {
        self.queued_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pushes(&self) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bad_blocks(&self, count: u64) {
        self.bad_blocks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bad_records(&self, count: u64) {
        self.bad_records.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_index_flushes(&self) {
        self.index_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            queued_writes: self.queued_writes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            pushes: self.pushes.load(Ordering::Relaxed),
            bad_blocks: self.bad_blocks.load(Ordering::Relaxed),
            bad_records: self.bad_records.load(Ordering::Relaxed),
            index_flushes: self.index_flushes.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub queued_writes: u64,
    pub commits: u64,
    pub commit_failures: u64,
    pub pushes: u64,
    pub bad_blocks: u64,
    pub bad_records: u64,
    pub index_flushes: u64,
}

impl MetricsSnapshot {
    /// Snapshot as a JSON object with stable key order
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.inserts, 0);
        assert_eq!(snapshot.commits, 0);
        assert_eq!(snapshot.bad_records, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_inserts();
        registry.increment_inserts();
        registry.increment_updates();
        registry.add_bad_records(3);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.inserts, 2);
        assert_eq!(snapshot.updates, 1);
        assert_eq!(snapshot.bad_records, 3);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_commits();

        let parsed: serde_json::Value =
            serde_json::from_str(&registry.snapshot().to_json()).unwrap();
        assert_eq!(parsed["commits"], 1);
        assert_eq!(parsed["deletes"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_inserts();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().inserts, 1000);
    }
}
