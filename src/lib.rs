//! gitdb - an embedded record store versioned by commits
//!
//! Records live in JSON block files under a database directory. Every
//! mutation is handed to a background worker that batches changes into
//! version-control commits through a [`CommitBackend`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use gitdb::{Config, GitDb, NoopBackend};
//!
//! let db = GitDb::open(Config::new("./data"), Arc::new(NoopBackend))?;
//! let datasets = db.datasets()?;
//! db.close()?;
//! # Ok::<(), gitdb::DbError>(())
//! ```

pub mod cli;
pub mod commit;
pub mod config;
pub mod crypto;
pub mod db;
pub mod errors;
pub mod id;
pub mod index;
pub mod model;
pub mod observability;
pub mod storage;

pub use commit::{CommitBackend, MemoryBackend, NoopBackend};
pub use config::{Config, Durability};
pub use db::{GitDb, Transaction, TransactionReport, MAX_INSERT_MANY};
pub use errors::{DbError, DbResult};
pub use id::{build_id, parse_id, RecordId};
pub use index::SearchMode;
pub use model::{BaseModel, BlockMethod, Model, Schema};
