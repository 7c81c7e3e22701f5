//! Read path
//!
//! Reads take no lock. Every call rereads block files, so a read running
//! next to a write sees either the old or the new block.

use tracing::{info, warn};

use super::GitDb;
use crate::errors::{DbError, DbResult};
use crate::id::RecordId;
use crate::index::{group_by_block, match_ids, SearchMode};
use crate::model::Model;
use crate::observability::Event;
use crate::storage::{load_block, Block};

impl GitDb {
    /// Load one record by compound id
    pub fn get<M: Model>(&self, id: &str) -> DbResult<M> {
        self.ensure_open()?;
        let parsed = RecordId::parse(id)?;
        let path = self.paths.block_file(&parsed.dataset, &parsed.block);
        if !path.exists() {
            return Err(DbError::RecordNotFound(id.to_string()));
        }

        let block = load_block(&path, &parsed.dataset)?;
        block.get(id)?.hydrate(self.cipher.as_ref())
    }

    /// Load every readable record of a dataset.
    ///
    /// Bad blocks and bad records are logged, counted and skipped.
    pub fn fetch<M: Model>(&self, dataset: &str) -> DbResult<Vec<M>> {
        self.ensure_open()?;
        let mut models = Vec::new();
        for path in self.paths.block_files(dataset)? {
            let Some(block) = self.load_readable(&path, dataset) else {
                continue;
            };
            models.extend(self.hydrate_block(&block, |_| true));
        }
        Ok(models)
    }

    /// Find records whose indexed `fields` match any of `values`.
    ///
    /// Matching ignores case. A record must match on every field. Fails with
    /// `IndexNotFound` if a field has no index. Results are ordered by block,
    /// then by id.
    pub fn search<M: Model>(
        &self,
        dataset: &str,
        fields: &[&str],
        values: &[&str],
        mode: SearchMode,
    ) -> DbResult<Vec<M>> {
        self.ensure_open()?;

        let indexes = fields
            .iter()
            .map(|field| self.indexes.load(dataset, field))
            .collect::<DbResult<Vec<_>>>()?;
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();

        let matched = match_ids(&indexes, &values, mode);
        let mut models = Vec::with_capacity(matched.len());

        for (block_name, ids) in group_by_block(&matched)? {
            let path = self.paths.block_file(dataset, &block_name);
            if !path.exists() {
                continue;
            }
            let Some(block) = self.load_readable(&path, dataset) else {
                continue;
            };
            models.extend(self.hydrate_block(&block, |id| ids.iter().any(|m| m == id)));
        }

        Ok(models)
    }

    /// Rebuild every index from block contents, then flush.
    ///
    /// Index values are taken from the record envelopes, so no model type is
    /// needed. The rebuild holds the write lock, so no write or delete lands
    /// between reading a block and indexing it.
    pub fn build_index(&self) -> DbResult<()> {
        self.ensure_open()?;
        info!(event = %Event::IndexRebuildBegin, "rebuilding indexes");

        let writer = self.lock_writer();
        let result = self.rebuild_locked();
        self.release(writer);

        let (datasets, records) = result?;
        self.flush_index()?;
        info!(event = %Event::IndexRebuildComplete, datasets, records, "indexes rebuilt");
        Ok(())
    }

    /// Reset and refill the index cache. Returns `(datasets, records)`.
    fn rebuild_locked(&self) -> DbResult<(usize, usize)> {
        let mut records = 0usize;
        let datasets = self.paths.datasets()?;
        for dataset in &datasets {
            self.indexes.reset_dataset(dataset)?;
            for path in self.paths.block_files(dataset)? {
                let Some(block) = self.load_readable(&path, dataset) else {
                    continue;
                };
                let decoded = block.decode_all(self.cipher.as_ref());
                self.metrics.add_bad_records(decoded.bad_records.len() as u64);

                records += decoded.records.len();
                self.indexes.update_indexes(
                    dataset,
                    decoded
                        .records
                        .iter()
                        .map(|(id, envelope)| (id.as_str(), &envelope.indexes)),
                );
            }
        }
        Ok((datasets.len(), records))
    }

    /// Load a block, logging and counting it if it is bad
    fn load_readable(&self, path: &std::path::Path, dataset: &str) -> Option<Block> {
        match load_block(path, dataset) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(event = %Event::BadBlock, path = %path.display(), error = %e, "skipping unreadable block");
                self.metrics.add_bad_blocks(1);
                None
            }
        }
    }

    /// Hydrate the records of a block accepted by `keep`, skipping bad ones
    fn hydrate_block<M: Model>(&self, block: &Block, keep: impl Fn(&str) -> bool) -> Vec<M> {
        let mut models = Vec::new();
        for record in block.records().filter(|r| keep(&r.id)) {
            match record.hydrate(self.cipher.as_ref()) {
                Ok(model) => models.push(model),
                Err(e) => {
                    warn!(event = %Event::BadRecord, id = %record.id, block = %block.name(), error = %e, "skipping unreadable record");
                    self.metrics.add_bad_records(1);
                }
            }
        }
        models
    }
}
