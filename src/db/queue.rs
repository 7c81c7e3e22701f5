//! Write queue
//!
//! Holds writes accepted while another caller held the write lock. Entries
//! are already validated and serialized, so draining them needs no model
//! type. A queued write is not visible to reads until it is drained.

use crate::id::RecordId;
use crate::storage::Envelope;

/// A validated write, ready to be merged into its block
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub id: RecordId,
    pub envelope: Envelope,
    /// Seal the payload before storing it
    pub encrypt: bool,
}

/// Writes waiting for the write lock, in arrival order
#[derive(Debug, Default)]
pub struct WriteQueue {
    entries: Vec<PendingWrite>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write. A pending write for the same id is replaced in place.
    pub fn push(&mut self, write: PendingWrite) {
        match self.entries.iter_mut().find(|e| e.id == write.id) {
            Some(existing) => *existing = write,
            None => self.entries.push(write),
        }
    }

    /// Take every pending write, oldest first
    pub fn drain(&mut self) -> Vec<PendingWrite> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn pending(record: &str, value: i64) -> PendingWrite {
        PendingWrite {
            id: RecordId::new("Booking", "202401", record).unwrap(),
            envelope: Envelope {
                indexes: BTreeMap::new(),
                data: json!({ "value": value }),
            },
            encrypt: false,
        }
    }

    #[test]
    fn test_drain_in_arrival_order() {
        let mut queue = WriteQueue::new();
        queue.push(pending("b", 1));
        queue.push(pending("a", 2));

        let drained = queue.drain();
        assert_eq!(drained[0].id.record, "b");
        assert_eq!(drained[1].id.record, "a");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_id_replaces_pending_write() {
        let mut queue = WriteQueue::new();
        queue.push(pending("a", 1));
        queue.push(pending("b", 1));
        queue.push(pending("a", 3));

        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert_eq!(drained[0].envelope.data["value"], 3);
    }
}
