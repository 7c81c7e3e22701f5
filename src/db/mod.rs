//! The storage engine
//!
//! A [`GitDb`] is one connection to one database directory. It owns the
//! write lock, the write queue, the index cache and the commit worker; there
//! is no state outside the instance.
//!
//! Block-mutating operations serialize on the write lock. Commit events are
//! emitted inside the critical section, so the worker sees them in the order
//! the writes completed. Reads take no lock and reread block files fresh.

mod delete;
mod queue;
mod read;
mod transaction;
mod write;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::commit::{CommitBackend, CommitEvent, CommitLatch, CommitPipeline, PipelineConfig};
use crate::config::{Config, Durability};
use crate::crypto::Cipher;
use crate::errors::{DbError, DbResult};
use crate::index::IndexStore;
use crate::observability::{Event, MetricsRegistry, MetricsSnapshot};
use crate::storage::{load_datasets, Dataset, DbPaths};

pub use queue::{PendingWrite, WriteQueue};
pub use transaction::{Transaction, TransactionReport};

/// Largest batch accepted by `insert_many`
pub const MAX_INSERT_MANY: usize = 100;

/// State guarded by the write lock
#[derive(Debug)]
struct Writer {
    /// Sending half of the commit channel; `None` once closed
    events: Option<SyncSender<CommitEvent>>,
}

impl Writer {
    fn emit(&self, event: CommitEvent) -> DbResult<()> {
        let sender = self.events.as_ref().ok_or(DbError::ConnectionClosed)?;
        sender.send(event).map_err(|_| DbError::ConnectionClosed)
    }

    fn is_detached(&self) -> bool {
        self.events.is_none()
    }
}

/// A connection to a gitdb database
pub struct GitDb {
    config: Config,
    paths: DbPaths,
    cipher: Option<Cipher>,
    indexes: Arc<IndexStore>,
    metrics: Arc<MetricsRegistry>,
    writer: Mutex<Writer>,
    queue: Mutex<WriteQueue>,
    pipeline: Mutex<CommitPipeline>,
    closed: AtomicBool,
}

impl std::fmt::Debug for GitDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitDb")
            .field("connection", &self.config.connection_name)
            .field("db_path", &self.config.db_path)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl GitDb {
    /// Open a connection and start its commit worker
    pub fn open(config: Config, backend: Arc<dyn CommitBackend>) -> DbResult<Self> {
        config.validate()?;

        fs::create_dir_all(&config.db_path)
            .map_err(|e| DbError::io(format!("create {}", config.db_path.display()), e))?;

        let cipher = config
            .encryption_key
            .as_deref()
            .map(Cipher::from_passphrase)
            .transpose()?;

        let paths = DbPaths::new(&config.db_path);
        let indexes = Arc::new(IndexStore::new(paths.clone()));
        let metrics = Arc::new(MetricsRegistry::new());

        let pipeline_config = PipelineConfig {
            name: config.connection_name.clone(),
            sync_interval: config.sync_interval(),
            max_batch: config.max_commit_batch,
            buffer: config.event_buffer,
            auto_commit: config.auto_commit,
            push: config.should_push(),
        };
        let (sender, pipeline) = CommitPipeline::spawn(
            pipeline_config,
            backend,
            Arc::clone(&indexes),
            Arc::clone(&metrics),
        )?;

        info!(
            event = %Event::ConnectionOpen,
            connection = %config.connection_name,
            db_path = %config.db_path.display(),
            durability = ?config.durability,
            encrypted = cipher.is_some(),
            "connection opened"
        );

        Ok(Self {
            config,
            paths,
            cipher,
            indexes,
            metrics,
            writer: Mutex::new(Writer { events: Some(sender) }),
            queue: Mutex::new(WriteQueue::new()),
            pipeline: Mutex::new(pipeline),
            closed: AtomicBool::new(false),
        })
    }

    /// Drain the write queue, stop the commit worker and flush indexes.
    ///
    /// Idempotent. Every later operation fails with `ConnectionClosed`.
    pub fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // dropping the sender lets the worker drain and exit
        let writer = self.writer.lock();
        self.release_closed(writer);
        self.pipeline.lock().join();

        let result = self.flush_index();
        info!(event = %Event::ConnectionClose, connection = %self.config.connection_name, "connection closed");
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &DbPaths {
        &self.paths
    }

    /// Counters since the connection opened
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Every dataset with its blocks, for browsing
    pub fn datasets(&self) -> DbResult<Vec<Dataset>> {
        self.ensure_open()?;
        load_datasets(&self.paths, self.cipher.as_ref())
    }

    /// One dataset with its blocks, for browsing
    pub fn dataset(&self, name: &str) -> DbResult<Dataset> {
        self.ensure_open()?;
        Dataset::load(&self.paths, name, self.cipher.as_ref())
    }

    /// Write the index cache to disk now
    pub fn flush_index(&self) -> DbResult<()> {
        if self.indexes.flush()? {
            self.metrics.increment_index_flushes();
        }
        Ok(())
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::ConnectionClosed);
        }
        Ok(())
    }

    /// Latch for a write that must wait for its commit
    fn ack_latch(&self) -> Option<Arc<CommitLatch>> {
        match self.config.durability {
            Durability::Sync => Some(Arc::new(CommitLatch::new())),
            Durability::Async => None,
        }
    }

    /// Block until the worker acknowledges every event armed on `latch`
    fn await_commit(&self, latch: Option<Arc<CommitLatch>>) -> DbResult<()> {
        let Some(latch) = latch else {
            return Ok(());
        };
        latch.wait(self.config.commit_timeout()).map_err(|e| {
            if let DbError::CommitTimeout { waited_ms } = &e {
                error!(event = %Event::CommitTimeout, waited_ms, "commit not acknowledged in time");
            }
            e
        })
    }
}

impl Drop for GitDb {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(event = %Event::ConnectionClose, error = %e, "close on drop failed");
        }
    }
}
