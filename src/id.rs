//! Compound record ids
//!
//! Every record is addressed as `dataset/block/record`. The id is computed
//! once, when the record is first accepted for writing, and never changes.
//! It locates the block file directly, so no directory scan is needed.

use std::fmt;
use std::str::FromStr;

use crate::errors::{DbError, DbResult};

/// Separator between id segments
pub const ID_SEPARATOR: char = '/';

/// Parsed form of a compound id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub dataset: String,
    pub block: String,
    pub record: String,
}

impl RecordId {
    /// Build an id from its segments.
    ///
    /// Segments must be non-empty, must not contain a path separator and must
    /// not start with `.`, so an id always names a file under the db root.
    pub fn new(
        dataset: impl Into<String>,
        block: impl Into<String>,
        record: impl Into<String>,
    ) -> DbResult<Self> {
        let id = Self {
            dataset: dataset.into(),
            block: block.into(),
            record: record.into(),
        };
        if [&id.dataset, &id.block, &id.record]
            .iter()
            .any(|segment| !valid_segment(segment))
        {
            return Err(DbError::InvalidRecordId(id.to_string()));
        }
        Ok(id)
    }

    /// Parse `dataset/block/record`
    pub fn parse(id: &str) -> DbResult<Self> {
        let segments: Vec<&str> = id.split(ID_SEPARATOR).collect();
        match segments.as_slice() {
            [dataset, block, record] => Self::new(*dataset, *block, *record),
            _ => Err(DbError::InvalidRecordId(id.to_string())),
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && !segment.contains(ID_SEPARATOR)
        && !segment.contains('\\')
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.dataset,
            self.block,
            self.record,
            sep = ID_SEPARATOR
        )
    }
}

impl FromStr for RecordId {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

/// Split a compound id into `(dataset, block, record)`
pub fn parse_id(id: &str) -> DbResult<(String, String, String)> {
    let parsed = RecordId::parse(id)?;
    Ok((parsed.dataset, parsed.block, parsed.record))
}

/// Join segments into a compound id
pub fn build_id(dataset: &str, block: &str, record: &str) -> DbResult<String> {
    RecordId::new(dataset, block, record).map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let (dataset, block, record) = parse_id("Booking/202401/room_1").unwrap();
        assert_eq!(dataset, "Booking");
        assert_eq!(block, "202401");
        assert_eq!(record, "room_1");
    }

    #[test]
    fn test_build_then_parse() {
        for (d, b, r) in [("a", "b", "c"), ("Booking", "202401", "room_1"), ("x-y", "b0", "k.v")] {
            let id = build_id(d, b, r).unwrap();
            assert_eq!(parse_id(&id).unwrap(), (d.to_string(), b.to_string(), r.to_string()));
        }
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(matches!(parse_id("a/b"), Err(DbError::InvalidRecordId(_))));
        assert!(matches!(parse_id("a/b/c/d"), Err(DbError::InvalidRecordId(_))));
        assert!(matches!(parse_id(""), Err(DbError::InvalidRecordId(_))));
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(parse_id("a//c").is_err());
        assert!(build_id("a", "", "c").is_err());
    }

    #[test]
    fn test_separator_in_segment_rejected() {
        assert!(build_id("a", "b/c", "d").is_err());
    }

    #[test]
    fn test_dot_segments_rejected() {
        for id in ["../x/y", "a/../c", "a/b/..", "./b/c", ".index/b/c", "a/.hidden/c"] {
            assert!(matches!(parse_id(id), Err(DbError::InvalidRecordId(_))), "{}", id);
        }
        assert!(build_id("..", "escaped", "r1").is_err());
        assert!(build_id("a", "b\\..", "c").is_err());
        // dots inside a segment are fine
        assert!(build_id("a", "b", "k.v").is_ok());
    }

    #[test]
    fn test_from_str() {
        let id: RecordId = "Booking/202401/room_1".parse().unwrap();
        assert_eq!(id.to_string(), "Booking/202401/room_1");
    }
}
