//! Commit pipeline
//!
//! Turns write and delete events into version-control commits on a
//! background worker, and reports completion back to synchronous callers.

mod backend;
mod event;
mod latch;
mod pipeline;

pub use backend::{CommitBackend, CommitEntry, MemoryBackend, NoopBackend};
pub use event::{CommitEvent, EventKind};
pub use latch::CommitLatch;
pub use pipeline::{common_ancestor, CommitPipeline, PipelineConfig};
