//! Transactions
//!
//! A named list of operations run in order. There is no rollback: the first
//! failure stops the run and earlier operations stay applied.

use tracing::{debug, warn};

use super::GitDb;
use crate::errors::{DbError, DbResult};

type Operation<'a> = Box<dyn FnOnce(&GitDb) -> DbResult<()> + 'a>;

/// Outcome of a fully applied transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReport {
    pub name: String,
    pub operations: usize,
}

/// Operations queued against one connection
pub struct Transaction<'a> {
    db: &'a GitDb,
    name: String,
    operations: Vec<Operation<'a>>,
}

impl GitDb {
    pub fn transaction(&self, name: impl Into<String>) -> Transaction<'_> {
        Transaction {
            db: self,
            name: name.into(),
            operations: Vec::new(),
        }
    }
}

impl<'a> Transaction<'a> {
    pub fn add_operation(&mut self, operation: impl FnOnce(&GitDb) -> DbResult<()> + 'a) -> &mut Self {
        self.operations.push(Box::new(operation));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run every operation in order.
    ///
    /// On failure returns `PartialBatch` listing the completed operations as
    /// `name[index]`.
    pub fn commit(self) -> DbResult<TransactionReport> {
        let total = self.operations.len();
        let mut completed = Vec::with_capacity(total);

        for (index, operation) in self.operations.into_iter().enumerate() {
            if let Err(e) = operation(self.db) {
                warn!(transaction = %self.name, failed_at = index, total, error = %e, "transaction stopped");
                return Err(DbError::PartialBatch {
                    completed,
                    source: Box::new(e),
                });
            }
            completed.push(format!("{}[{}]", self.name, index));
        }

        debug!(transaction = %self.name, operations = total, "transaction applied");
        Ok(TransactionReport {
            name: self.name,
            operations: total,
        })
    }
}
