//! Block files
//!
//! A block is the unit of disk I/O and of a commit: one JSON object mapping
//! compound ids to record payloads. Blocks are always loaded whole.
//!
//! Invariants:
//! - A block that does not parse is reported as `BadBlock`, never a panic
//! - A record that does not decode is reported alone; its siblings stay readable
//! - Serialization is ordered by id so identical content gives identical bytes

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::warn;
use uuid::Uuid;

use super::paths::block_name;
use super::record::{Envelope, Record};
use crate::crypto::Cipher;
use crate::errors::{DbError, DbResult};
use crate::observability::Event;

/// In-memory block
#[derive(Debug, Clone, Default)]
pub struct Block {
    dataset: String,
    name: String,
    records: BTreeMap<String, Record>,
    dirty: bool,
}

/// Result of decoding every record of a block
#[derive(Debug, Default)]
pub struct DecodedBlock {
    /// Readable records, ordered by id
    pub records: Vec<(String, Envelope)>,
    /// Ids of records that failed to decode
    pub bad_records: Vec<String>,
}

impl Block {
    pub fn new(dataset: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            name: name.into(),
            records: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace a record; last write wins
    pub fn add(&mut self, id: impl Into<String>, payload: impl Into<String>) {
        let id = id.into();
        let record = Record::new(id.clone(), payload, self.dataset.clone());
        self.records.insert(id, record);
        self.dirty = true;
    }

    pub fn get(&self, id: &str) -> DbResult<&Record> {
        self.records
            .get(id)
            .ok_or_else(|| DbError::RecordNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn delete(&mut self, id: &str) -> DbResult<()> {
        match self.records.remove(id) {
            Some(_) => {
                self.dirty = true;
                Ok(())
            }
            None => Err(DbError::RecordNotFound(id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the block changed since it was loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Ordered id -> payload view used for serialization
    pub fn data(&self) -> BTreeMap<&str, &str> {
        self.records
            .iter()
            .map(|(id, record)| (id.as_str(), record.data.as_str()))
            .collect()
    }

    /// Decode every record, collecting the ones that fail instead of aborting
    pub fn decode_all(&self, cipher: Option<&Cipher>) -> DecodedBlock {
        let mut decoded = DecodedBlock::default();
        for (id, record) in &self.records {
            match record.open(cipher) {
                Ok(envelope) => decoded.records.push((id.clone(), envelope)),
                Err(e) => {
                    warn!(event = %Event::BadRecord, id = %id, block = %self.name, error = %e, "skipping unreadable record");
                    decoded.bad_records.push(id.clone());
                }
            }
        }
        decoded
    }
}

/// Load a block file. A missing file yields an empty block.
pub fn load_block(path: &Path, dataset: &str) -> DbResult<Block> {
    let mut block = Block::new(dataset, block_name(path));

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(block),
        Err(e) => return Err(DbError::io(format!("read block {}", path.display()), e)),
    };

    let raw: BTreeMap<String, String> =
        serde_json::from_slice(&bytes).map_err(|e| DbError::BadBlock {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    for (id, payload) in raw {
        block
            .records
            .insert(id.clone(), Record::new(id, payload, dataset));
    }

    Ok(block)
}

/// Serialize a block and replace the file at `path`
pub fn write_block(path: &Path, block: &Block) -> DbResult<()> {
    let bytes = encode_block(block)?;
    write_atomic(path, &bytes)
}

/// Replace the file at `path` with `bytes`.
///
/// The bytes go to a sibling temp file which is then renamed over the
/// target, so a crash leaves either the old or the new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> DbResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| DbError::Config(format!("path has no parent: {}", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| DbError::io(format!("create {}", dir.display()), e))?;

    let tmp = dir.join(format!(".{}.{}.tmp", block_name(path), Uuid::new_v4().simple()));
    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(DbError::io(format!("write {}", path.display()), e));
    }

    Ok(())
}

/// Tab-indented JSON
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value.serialize(&mut serializer)?;
    Ok(bytes)
}

/// Serialized form of the ordered `data()` view
fn encode_block(block: &Block) -> DbResult<Vec<u8>> {
    to_pretty_json(&block.data())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(name: &str) -> String {
        format!(r#"{{"indexes":{{}},"data":{{"name":"{}"}}}}"#, name)
    }

    #[test]
    fn test_add_replaces_by_id() {
        let mut block = Block::new("Booking", "202401");
        block.add("Booking/202401/a", payload("one"));
        block.add("Booking/202401/a", payload("two"));

        assert_eq!(block.len(), 1);
        assert_eq!(block.get("Booking/202401/a").unwrap().data, payload("two"));
        assert!(block.is_dirty());
    }

    #[test]
    fn test_get_and_delete_missing() {
        let mut block = Block::new("Booking", "202401");
        assert!(matches!(block.get("x"), Err(DbError::RecordNotFound(_))));
        assert!(matches!(block.delete("x"), Err(DbError::RecordNotFound(_))));
        assert!(!block.is_dirty());
    }

    #[test]
    fn test_write_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Booking/202401.json");

        let mut block = Block::new("Booking", "202401");
        block.add("Booking/202401/b", payload("b"));
        block.add("Booking/202401/a", payload("a"));
        write_block(&path, &block).unwrap();

        let loaded = load_block(&path, "Booking").unwrap();
        assert_eq!(loaded.name(), "202401");
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.get("Booking/202401/a").unwrap().data, payload("a"));

        // no temp files left behind
        let leftovers = fs::read_dir(temp.path().join("Booking")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let mut first = Block::new("d", "b");
        first.add("d/b/2", "{}");
        first.add("d/b/1", "{}");

        let mut second = Block::new("d", "b");
        second.add("d/b/1", "{}");
        second.add("d/b/2", "{}");

        let bytes = encode_block(&first).unwrap();
        assert_eq!(bytes, encode_block(&second).unwrap());

        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("d/b/1").unwrap() < text.find("d/b/2").unwrap());
        assert!(text.contains("\n\t\""));
    }

    #[test]
    fn test_missing_file_is_empty_block() {
        let temp = TempDir::new().unwrap();
        let block = load_block(&temp.path().join("none.json"), "Booking").unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn test_unparsable_file_is_bad_block() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("202401.json");
        fs::write(&path, b"[1, 2").unwrap();

        assert!(matches!(load_block(&path, "Booking"), Err(DbError::BadBlock { .. })));
    }

    #[test]
    fn test_decode_all_isolates_bad_records() {
        let mut block = Block::new("Booking", "202401");
        block.add("Booking/202401/a", payload("a"));
        block.add("Booking/202401/b", "{broken");
        block.add("Booking/202401/c", payload("c"));

        let decoded = block.decode_all(None);
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.bad_records, vec!["Booking/202401/b".to_string()]);
    }
}
