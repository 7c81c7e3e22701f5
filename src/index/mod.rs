//! Secondary indexes
//!
//! Per-dataset, per-field index files with a write-back cache, and the
//! matching rules used by search.

mod search;
mod store;

pub use search::{group_by_block, match_field, match_ids, value_text, SearchMode};
pub use store::{read_index, IndexData, IndexStore};
