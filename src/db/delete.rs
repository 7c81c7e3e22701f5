//! Delete path

use tracing::debug;

use super::GitDb;
use crate::commit::CommitEvent;
use crate::errors::{DbError, DbResult};
use crate::id::RecordId;
use crate::observability::Event;
use crate::storage::{load_block, write_block};

impl GitDb {
    /// Delete a record. Deleting an absent record succeeds.
    pub fn delete(&self, id: &str) -> DbResult<()> {
        match self.delete_record(id) {
            Err(DbError::RecordNotFound(_)) => Ok(()),
            other => other,
        }
    }

    /// Delete a record, failing with `RecordNotFound` if it is absent
    pub fn delete_or_fail(&self, id: &str) -> DbResult<()> {
        self.delete_record(id)
    }

    fn delete_record(&self, id: &str) -> DbResult<()> {
        self.ensure_open()?;
        let parsed = RecordId::parse(id)?;
        let path = self.paths.block_file(&parsed.dataset, &parsed.block);
        let latch = self.ack_latch();

        let writer = self.lock_writer();
        let result = (|| -> DbResult<()> {
            if !path.exists() {
                return Err(DbError::RecordNotFound(id.to_string()));
            }

            let mut block = load_block(&path, &parsed.dataset)?;
            block.delete(id)?;
            write_block(&path, &block)?;

            self.indexes.remove_record(&parsed.dataset, id)?;
            let location = self.paths.relative(&path);
            writer.emit(CommitEvent::delete(
                format!("Deleting {} in {}", id, location),
                &path,
                latch.clone(),
            ))?;

            self.metrics.increment_deletes();
            debug!(event = %Event::RecordDelete, id = %id, block = %location, "record deleted");
            Ok(())
        })();
        self.release(writer);

        result?;
        self.await_commit(latch)
    }
}
