//! Block storage for gitdb
//!
//! Records live in blocks; blocks live in dataset directories. Block files
//! are plain JSON objects (`id -> payload`) so that every change produces a
//! small, reviewable diff for the commit backend.
//!
//! # Invariants
//!
//! - Block content is valid JSON or the block is reported as bad
//! - One corrupt record never hides its siblings
//! - Block bytes are deterministic for identical content

mod block;
mod dataset;
mod paths;
mod record;

pub use block::{load_block, write_block, Block, DecodedBlock};
pub(crate) use block::{to_pretty_json, write_atomic};
pub use dataset::{format_bytes, load_datasets, BlockView, Dataset, Table, TABLE_CELL_WIDTH};
pub use paths::{block_name, DbPaths, BLOCK_EXT, INDEX_DIR};
pub use record::{Envelope, Record};
