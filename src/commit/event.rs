//! Commit events
//!
//! One event per logical mutation. Events travel over the connection's
//! bounded channel to the commit worker in the order their write critical
//! sections completed.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::latch::CommitLatch;

/// Kind of mutation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Write,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Write => write!(f, "write"),
            EventKind::Delete => write!(f, "delete"),
        }
    }
}

/// A change waiting to be committed.
///
/// An event that is dropped without being acknowledged (for example because
/// the channel closed) releases its latch with a failure, so a waiting caller
/// is never left hanging on it.
#[derive(Debug)]
pub struct CommitEvent {
    pub message: String,
    /// Block file the change touched
    pub path: PathBuf,
    pub kind: EventKind,
    ack: Option<Arc<CommitLatch>>,
}

impl CommitEvent {
    /// Build an event. An `ack` latch is armed here.
    pub fn new(
        kind: EventKind,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        ack: Option<Arc<CommitLatch>>,
    ) -> Self {
        if let Some(latch) = &ack {
            latch.arm();
        }
        Self {
            message: message.into(),
            path: path.into(),
            kind,
            ack,
        }
    }

    pub fn write(message: impl Into<String>, path: impl Into<PathBuf>, ack: Option<Arc<CommitLatch>>) -> Self {
        Self::new(EventKind::Write, message, path, ack)
    }

    pub fn delete(message: impl Into<String>, path: impl Into<PathBuf>, ack: Option<Arc<CommitLatch>>) -> Self {
        Self::new(EventKind::Delete, message, path, ack)
    }

    pub fn requires_ack(&self) -> bool {
        self.ack.is_some()
    }

    /// Report the outcome to the waiting caller, if any
    pub fn acknowledge(mut self, error: Option<String>) {
        if let Some(latch) = self.ack.take() {
            latch.count_down(error);
        }
    }
}

impl Drop for CommitEvent {
    fn drop(&mut self) {
        if let Some(latch) = self.ack.take() {
            latch.count_down(Some(format!("commit event dropped: {}", self.message)));
        }
    }
}
