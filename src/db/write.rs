//! Write path
//!
//! Insert stamps and validates the model, then merges it into its block
//! under the write lock. The lock holder always drains the write queue
//! before its own write and again before releasing the lock.

use std::fs;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::MutexGuard;
use tracing::{debug, error};

use super::queue::PendingWrite;
use super::{GitDb, Writer, MAX_INSERT_MANY};
use crate::commit::{CommitEvent, CommitLatch};
use crate::config::Durability;
use crate::errors::{DbError, DbResult};
use crate::model::Model;
use crate::observability::Event;
use crate::storage::{load_block, write_block, Envelope};

impl GitDb {
    /// Insert or update a model and return its compound id.
    ///
    /// A model whose schema resolves to an existing id replaces that record.
    /// With sync durability the call returns once the change is committed;
    /// `CommitFailed` and `CommitTimeout` mean the record is on disk but not
    /// guaranteed to be versioned.
    pub fn insert<M: Model>(&self, model: &mut M) -> DbResult<String> {
        self.ensure_open()?;
        let pending = self.prepare(model)?;
        let id = pending.id.to_string();

        match self.config.durability {
            Durability::Async => self.submit_or_queue(pending)?,
            Durability::Sync => {
                let latch = self.ack_latch();
                let writer = self.lock_writer();
                let result = self.write_locked(&writer, &pending, latch.as_ref());
                self.release(writer);
                result?;
                self.await_commit(latch)?;
            }
        }

        Ok(id)
    }

    /// Insert up to [`MAX_INSERT_MANY`] models under one hold of the write lock.
    ///
    /// Larger batches fail with `TooManyModels` before anything is written.
    /// Otherwise the batch stops at its first failure; writes before it stay
    /// in place and are reported through `PartialBatch`.
    pub fn insert_many<M: Model>(&self, models: &mut [M]) -> DbResult<Vec<String>> {
        self.ensure_open()?;
        if models.len() > MAX_INSERT_MANY {
            return Err(DbError::TooManyModels {
                count: models.len(),
                max: MAX_INSERT_MANY,
            });
        }

        let latch = self.ack_latch();
        let mut completed = Vec::with_capacity(models.len());
        let mut failure = None;

        let writer = self.lock_writer();
        for model in models.iter_mut() {
            let result = self.prepare(model).and_then(|pending| {
                self.write_locked(&writer, &pending, latch.as_ref())?;
                Ok(pending.id.to_string())
            });
            match result {
                Ok(id) => completed.push(id),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.release(writer);

        // completed writes are acknowledged even when the batch stopped early
        let committed = self.await_commit(latch);

        match failure {
            Some(source) if completed.is_empty() => Err(source),
            Some(source) => Err(DbError::PartialBatch {
                completed,
                source: Box::new(source),
            }),
            None => committed.map(|_| completed),
        }
    }

    /// Stamp, validate and serialize a model. No side effect on failure.
    pub(super) fn prepare<M: Model>(&self, model: &mut M) -> DbResult<PendingWrite> {
        model.base_mut().stamp(Utc::now());
        model.validate().map_err(DbError::Validation)?;

        let schema = model.schema();
        let id = schema.record_id()?;

        let encrypt = model.should_encrypt();
        if encrypt && self.cipher.is_none() {
            return Err(DbError::Encryption(format!(
                "{} requires encryption but no encryption key is configured",
                id.dataset
            )));
        }

        let dir = self.paths.dataset_dir(&id.dataset);
        fs::create_dir_all(&dir).map_err(|e| DbError::io(format!("create {}", dir.display()), e))?;

        model.base_mut().id = id.to_string();
        let envelope = Envelope::from_model(model, schema.indexes)?;

        Ok(PendingWrite { id, envelope, encrypt })
    }

    /// Write now if the lock is free, otherwise leave the write for the holder
    fn submit_or_queue(&self, pending: PendingWrite) -> DbResult<()> {
        let mut queue = self.queue.lock();
        // close drains the queue after setting the flag, so anything pushed
        // while it is still clear is written before the channel detaches
        if self.is_closed() {
            return Err(DbError::ConnectionClosed);
        }
        let Some(writer) = self.writer.try_lock() else {
            debug!(event = %Event::WriteQueued, id = %pending.id, pending = queue.len() + 1, "write lock busy, queued");
            queue.push(pending);
            self.metrics.increment_queued_writes();
            return Ok(());
        };
        drop(queue);

        self.flush_queue(&writer);
        let result = self.write_locked(&writer, &pending, None);
        self.release(writer);
        result
    }

    /// Take the write lock, draining the queue first
    pub(super) fn lock_writer(&self) -> MutexGuard<'_, Writer> {
        let writer = self.writer.lock();
        self.flush_queue(&writer);
        writer
    }

    /// Release the write lock once the queue is empty.
    ///
    /// The lock is dropped while the queue mutex is held, so a writer that
    /// queued behind this holder is always drained by it.
    pub(super) fn release(&self, writer: MutexGuard<'_, Writer>) {
        self.unlock(writer, false);
    }

    /// Like [`release`](Self::release), then detach the commit channel
    /// before the lock is dropped. Later writes fail with `ConnectionClosed`.
    pub(super) fn release_closed(&self, writer: MutexGuard<'_, Writer>) {
        self.unlock(writer, true);
    }

    fn unlock(&self, mut writer: MutexGuard<'_, Writer>, detach: bool) {
        loop {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                if detach {
                    writer.events = None;
                }
                drop(writer);
                drop(queue);
                return;
            }
            let pending = queue.drain();
            drop(queue);
            self.write_all(&writer, pending);
        }
    }

    /// Drain the write queue into block files
    fn flush_queue(&self, writer: &Writer) {
        let pending = self.queue.lock().drain();
        self.write_all(writer, pending);
    }

    fn write_all(&self, writer: &Writer, pending: Vec<PendingWrite>) {
        if pending.is_empty() {
            return;
        }
        debug!(event = %Event::QueueFlush, count = pending.len(), "flushing write queue");
        for write in pending {
            if let Err(e) = self.write_locked(writer, &write, None) {
                error!(event = %Event::QueueFlushFailed, id = %write.id, error = %e, "queued write failed");
            }
        }
    }

    /// Merge one record into its block and emit its commit event.
    ///
    /// Must be called with the write lock held.
    pub(super) fn write_locked(
        &self,
        writer: &Writer,
        pending: &PendingWrite,
        ack: Option<&Arc<CommitLatch>>,
    ) -> DbResult<()> {
        if writer.is_detached() {
            return Err(DbError::ConnectionClosed);
        }

        let dataset = pending.id.dataset.as_str();
        let id = pending.id.to_string();
        let path = self.paths.block_file(dataset, &pending.id.block);

        let mut block = load_block(&path, dataset)?;
        let existed = block.contains(&id);

        let mut payload = pending.envelope.to_payload()?;
        if pending.encrypt {
            let cipher = self
                .cipher
                .as_ref()
                .ok_or_else(|| DbError::Encryption("no encryption key configured".into()))?;
            payload = cipher.encrypt(&payload)?;
        }

        block.add(id.clone(), payload);
        write_block(&path, &block)?;

        let location = self.paths.relative(&path);
        let (message, event) = if existed {
            self.metrics.increment_updates();
            (format!("Updating {} in {}", id, location), Event::RecordUpdate)
        } else {
            self.metrics.increment_inserts();
            (format!("Inserting {} into {}", id, location), Event::RecordInsert)
        };

        self.indexes
            .update_indexes(dataset, [(id.as_str(), &pending.envelope.indexes)]);
        writer.emit(CommitEvent::write(message, &path, ack.cloned()))?;

        debug!(event = %event, id = %id, block = %location, "record written");
        Ok(())
    }
}
