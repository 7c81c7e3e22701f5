//! Observable events for gitdb
//!
//! Every log line carries an `event` field taken from this enum, so logs can
//! be filtered by a stable name instead of by message text.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Connection lifecycle
    /// Connection opened, commit worker running
    ConnectionOpen,
    /// Connection closed, commit worker joined
    ConnectionClose,
    /// Configuration file loaded
    ConfigLoaded,

    // Write path
    /// New record written into its block
    RecordInsert,
    /// Existing record replaced in its block
    RecordUpdate,
    /// Record removed from its block
    RecordDelete,
    /// Write deferred to the write queue
    WriteQueued,
    /// Write queue drained into blocks
    QueueFlush,
    /// Queued write failed while draining
    QueueFlushFailed,

    // Read path
    /// Block file could not be parsed
    BadBlock,
    /// Record inside a block could not be decoded
    BadRecord,

    // Indexes
    /// Index cache written to disk
    IndexFlush,
    /// Index file unreadable, treated as empty
    IndexReadFailed,
    /// Full index rebuild begins
    IndexRebuildBegin,
    /// Full index rebuild complete
    IndexRebuildComplete,

    // Commit pipeline
    /// Commit worker started
    PipelineStart,
    /// Commit worker stopped
    PipelineStop,
    /// Batch of events committed
    CommitBatch,
    /// Commit backend rejected a batch
    CommitFailed,
    /// Caller stopped waiting for a commit acknowledgment
    CommitTimeout,
    /// Remote synchronized
    PushComplete,
    /// Remote synchronization failed
    PushFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConnectionOpen => "CONNECTION_OPEN",
            Event::ConnectionClose => "CONNECTION_CLOSE",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::RecordInsert => "RECORD_INSERT",
            Event::RecordUpdate => "RECORD_UPDATE",
            Event::RecordDelete => "RECORD_DELETE",
            Event::WriteQueued => "WRITE_QUEUED",
            Event::QueueFlush => "QUEUE_FLUSH",
            Event::QueueFlushFailed => "QUEUE_FLUSH_FAILED",

            Event::BadBlock => "BAD_BLOCK",
            Event::BadRecord => "BAD_RECORD",

            Event::IndexFlush => "INDEX_FLUSH",
            Event::IndexReadFailed => "INDEX_READ_FAILED",
            Event::IndexRebuildBegin => "INDEX_REBUILD_BEGIN",
            Event::IndexRebuildComplete => "INDEX_REBUILD_COMPLETE",

            Event::PipelineStart => "PIPELINE_START",
            Event::PipelineStop => "PIPELINE_STOP",
            Event::CommitBatch => "COMMIT_BATCH",
            Event::CommitFailed => "COMMIT_FAILED",
            Event::CommitTimeout => "COMMIT_TIMEOUT",
            Event::PushComplete => "PUSH_COMPLETE",
            Event::PushFailed => "PUSH_FAILED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::QueueFlushFailed
                | Event::BadBlock
                | Event::BadRecord
                | Event::IndexReadFailed
                | Event::CommitFailed
                | Event::CommitTimeout
                | Event::PushFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
