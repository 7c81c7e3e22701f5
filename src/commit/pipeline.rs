//! Commit worker
//!
//! One background thread per connection consumes commit events off a bounded
//! channel. Events that are already waiting are folded into one commit, up to
//! `max_batch`, in arrival order. After every batch, and on every idle tick,
//! the worker flushes the index cache and retries a failed push.
//!
//! The worker exits once every sender is dropped and the channel is empty.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::backend::CommitBackend;
use super::event::CommitEvent;
use crate::errors::{DbError, DbResult};
use crate::index::IndexStore;
use crate::observability::{Event, MetricsRegistry};

/// Worker settings, derived from the connection config
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Connection name, used for the thread name
    pub name: String,
    /// Idle tick
    pub sync_interval: Duration,
    /// Most events folded into one commit
    pub max_batch: usize,
    /// Channel capacity
    pub buffer: usize,
    /// Commit events; otherwise they are only acknowledged
    pub auto_commit: bool,
    /// Push after each commit
    pub push: bool,
}

/// Handle to a running commit worker
#[derive(Debug)]
pub struct CommitPipeline {
    handle: Option<JoinHandle<()>>,
}

impl CommitPipeline {
    /// Start the worker and return the sending half of its channel
    pub fn spawn(
        config: PipelineConfig,
        backend: Arc<dyn CommitBackend>,
        indexes: Arc<IndexStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> DbResult<(SyncSender<CommitEvent>, Self)> {
        let (sender, receiver) = mpsc::sync_channel(config.buffer.max(1));
        let name = format!("gitdb-commit-{}", config.name);

        let mut worker = Worker {
            config,
            backend,
            indexes,
            metrics,
            push_pending: false,
        };
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run(receiver))
            .map_err(|e| DbError::io("spawn commit worker", e))?;

        Ok((sender, Self { handle: Some(handle) }))
    }

    /// Wait for the worker to drain its channel and exit.
    ///
    /// Every sender must already be dropped or this blocks forever.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(event = %Event::PipelineStop, "commit worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

struct Worker {
    config: PipelineConfig,
    backend: Arc<dyn CommitBackend>,
    indexes: Arc<IndexStore>,
    metrics: Arc<MetricsRegistry>,
    /// A push failed and has not succeeded since
    push_pending: bool,
}

impl Worker {
    fn run(&mut self, receiver: Receiver<CommitEvent>) {
        info!(event = %Event::PipelineStart, connection = %self.config.name, "commit worker started");

        loop {
            match receiver.recv_timeout(self.config.sync_interval) {
                Ok(first) => {
                    let mut batch = vec![first];
                    while batch.len() < self.config.max_batch {
                        match receiver.try_recv() {
                            Ok(event) => batch.push(event),
                            Err(_) => break,
                        }
                    }
                    self.process(batch);
                }
                Err(RecvTimeoutError::Timeout) => self.idle(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.idle();
        info!(event = %Event::PipelineStop, connection = %self.config.name, "commit worker stopped");
    }

    fn process(&mut self, batch: Vec<CommitEvent>) {
        let error = if self.config.auto_commit {
            self.commit(&batch).err().map(|e| e.to_string())
        } else {
            None
        };

        for event in batch {
            event.acknowledge(error.clone());
        }

        self.flush_index();
    }

    fn commit(&mut self, batch: &[CommitEvent]) -> DbResult<()> {
        let message = batch
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let path = common_ancestor(batch.iter().map(|e| e.path.as_path()));

        if let Err(e) = self.backend.commit(&message, &path) {
            self.metrics.increment_commit_failures();
            error!(event = %Event::CommitFailed, events = batch.len(), path = %path.display(), error = %e, "commit failed");
            return Err(e);
        }

        self.metrics.increment_commits();
        info!(event = %Event::CommitBatch, events = batch.len(), path = %path.display(), "committed");

        if self.config.push {
            self.push()?;
        }
        Ok(())
    }

    fn push(&mut self) -> DbResult<()> {
        match self.backend.push() {
            Ok(()) => {
                self.push_pending = false;
                self.metrics.increment_pushes();
                debug!(event = %Event::PushComplete, "remote synchronized");
                Ok(())
            }
            Err(e) => {
                self.push_pending = true;
                warn!(event = %Event::PushFailed, error = %e, "push failed, will retry");
                Err(e)
            }
        }
    }

    fn idle(&mut self) {
        if self.push_pending && self.config.push {
            let _ = self.push();
        }
        self.flush_index();
    }

    fn flush_index(&self) {
        // failures are logged by the store and retried on the next tick
        if let Ok(true) = self.indexes.flush() {
            self.metrics.increment_index_flushes();
        }
    }
}

/// Deepest path containing every given path
pub fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut paths = paths.into_iter();
    let Some(first) = paths.next() else {
        return PathBuf::new();
    };

    let mut common: PathBuf = first.to_path_buf();
    for path in paths {
        while !path.starts_with(&common) {
            if !common.pop() {
                return PathBuf::new();
            }
        }
    }
    common
}
