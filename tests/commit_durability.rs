//! Commit pipeline and durability tests
//!
//! - Sync writes return after their commit, with the expected messages
//! - Commit failures and timeouts surface as durability warnings while the
//!   data stays on disk
//! - Close drains pending events
//! - Delete and DeleteOrFail semantics

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{block_path, open_db, open_with, test_config, Booking, BLOCK, DATASET};
use gitdb::{DbError, Durability, MemoryBackend};
use tempfile::TempDir;

fn sync_db(temp: &TempDir, backend: &Arc<MemoryBackend>) -> gitdb::GitDb {
    let config = test_config(temp.path()).with_durability(Durability::Sync);
    open_with(config, backend.clone())
}

// =============================================================================
// Commit messages
// =============================================================================

#[test]
fn test_sync_write_is_committed_before_return() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let db = sync_db(&temp, &backend);

    let mut booking = Booking::new("b1", "Room", 2);
    let id = db.insert(&mut booking).unwrap();
    db.insert(&mut booking).unwrap();
    db.delete(&id).unwrap();

    assert_eq!(
        backend.messages(),
        vec![
            "Inserting Booking/202401/b1 into Booking/202401.json".to_string(),
            "Updating Booking/202401/b1 in Booking/202401.json".to_string(),
            "Deleting Booking/202401/b1 in Booking/202401.json".to_string(),
        ]
    );
    assert_eq!(db.metrics().commits as usize, backend.commits().len());
}

#[test]
fn test_commit_path_is_the_block_file() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let db = sync_db(&temp, &backend);

    db.insert(&mut Booking::new("b1", "Room", 2)).unwrap();

    let commits = backend.commits();
    assert_eq!(commits[0].path, block_path(temp.path(), BLOCK));
}

#[test]
fn test_push_follows_commit_when_remote_configured() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let config = test_config(temp.path())
        .with_durability(Durability::Sync)
        .with_online_remote("git@example.com:me/data.git");
    let db = open_with(config, backend.clone());

    db.insert(&mut Booking::new("b1", "Room", 2)).unwrap();
    assert_eq!(backend.push_count(), 1);
    assert_eq!(db.metrics().pushes, 1);
}

// =============================================================================
// Durability warnings
// =============================================================================

#[test]
fn test_commit_failure_keeps_data_on_disk() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.fail_commits(true);
    let db = sync_db(&temp, &backend);

    let err = db.insert(&mut Booking::new("b1", "Room", 2)).unwrap_err();
    assert!(matches!(err, DbError::CommitFailed(_)));
    assert!(err.is_durability_warning());

    let loaded: Booking = db.get("Booking/202401/b1").unwrap();
    assert_eq!(loaded.key, "b1");
    assert_eq!(db.metrics().commit_failures, 1);

    backend.fail_commits(false);
    db.insert(&mut Booking::new("b2", "Room", 2)).unwrap();
}

#[test]
fn test_commit_timeout_keeps_data_on_disk() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.set_delay(Some(Duration::from_millis(500)));
    let config = test_config(temp.path())
        .with_durability(Durability::Sync)
        .with_commit_timeout(Some(Duration::from_millis(50)));
    let db = open_with(config, backend.clone());

    let err = db.insert(&mut Booking::new("b1", "Room", 2)).unwrap_err();
    assert!(matches!(err, DbError::CommitTimeout { .. }));
    assert!(err.is_durability_warning());
    assert!(db.get::<Booking>("Booking/202401/b1").is_ok());

    // close waits for the worker, so the commit lands eventually
    db.close().unwrap();
    assert_eq!(backend.commits().len(), 1);
}

#[test]
fn test_async_writes_are_committed_by_close() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let db = open_with(test_config(temp.path()), backend.clone());

    for key in ["a", "b", "c"] {
        db.insert(&mut Booking::new(key, "Room", 2)).unwrap();
    }
    db.close().unwrap();

    assert_eq!(backend.messages().len(), 3);
    assert!(temp.path().join(".index/Booking/RoomType.json").exists());
}

#[test]
fn test_manual_commit_mode_skips_backend() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let config = test_config(temp.path())
        .with_durability(Durability::Sync)
        .with_auto_commit(false);
    let db = open_with(config, backend.clone());

    db.insert(&mut Booking::new("a", "Room", 2)).unwrap();
    assert!(backend.commits().is_empty());
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn test_delete_absent_record_is_noop() {
    let (_temp, db) = open_db();
    db.delete("Booking/202401/missing").unwrap();

    db.insert(&mut Booking::new("a", "Room", 2)).unwrap();
    db.delete("Booking/202401/missing").unwrap();
    assert_eq!(db.metrics().deletes, 0);
}

#[test]
fn test_delete_or_fail_reports_absence() {
    let (_temp, db) = open_db();
    db.insert(&mut Booking::new("a", "Room", 2)).unwrap();

    let err = db.delete_or_fail("Booking/202401/missing").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        db.delete_or_fail("Booking/202401"),
        Err(DbError::InvalidRecordId(_))
    ));

    db.delete_or_fail("Booking/202401/a").unwrap();
    assert!(db.get::<Booking>("Booking/202401/a").unwrap_err().is_not_found());
    assert_eq!(db.fetch::<Booking>(DATASET).unwrap().len(), 0);
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_transaction_runs_in_order() {
    let (_temp, db) = open_db();

    let mut tx = db.transaction("checkin");
    tx.add_operation(|db| db.insert(&mut Booking::new("a", "Room", 2)).map(|_| ()));
    tx.add_operation(|db| db.insert(&mut Booking::new("b", "Room", 2)).map(|_| ()));
    tx.add_operation(|db| db.delete("Booking/202401/a"));
    assert_eq!(tx.len(), 3);

    let report = tx.commit().unwrap();
    assert_eq!(report.operations, 3);

    let stored: Vec<Booking> = db.fetch(DATASET).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, "b");
}

#[test]
fn test_transaction_stops_without_rollback() {
    let (_temp, db) = open_db();

    let mut tx = db.transaction("checkin");
    tx.add_operation(|db| db.insert(&mut Booking::new("a", "Room", 2)).map(|_| ()));
    tx.add_operation(|db| db.delete_or_fail("Booking/202401/missing"));
    tx.add_operation(|db| db.insert(&mut Booking::new("c", "Room", 2)).map(|_| ()));

    match tx.commit().unwrap_err() {
        DbError::PartialBatch { completed, source } => {
            assert_eq!(completed, vec!["checkin[0]"]);
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let stored: Vec<Booking> = db.fetch(DATASET).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, "a");
}
