//! Model capability
//!
//! Records are stored as serialized models. A model type describes itself
//! through [`Model::schema`]: which dataset it belongs to, which block it
//! lands in, its record key, and the values of its indexed fields. The engine
//! is generic over this trait and never inspects concrete model types.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DbResult;
use crate::id::RecordId;

/// Metadata every stored model carries.
///
/// Embed with `#[serde(flatten)]` and expose it through
/// [`Model::base`] / [`Model::base_mut`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Compound id, assigned on first write
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BaseModel {
    /// Set `created_at` if unset and refresh `updated_at`
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }
}

/// Storage description of one model instance
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Dataset (directory) name
    pub name: String,
    /// Block the record lands in
    pub block: String,
    /// Record key, unique within the dataset
    pub record: String,
    /// Indexed field name -> value
    pub indexes: BTreeMap<String, Value>,
}

impl Schema {
    pub fn new(
        name: impl Into<String>,
        block: impl Into<String>,
        record: impl Into<String>,
        indexes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            block: block.into(),
            record: record.into(),
            indexes,
        }
    }

    /// Compound id for this schema
    pub fn record_id(&self) -> DbResult<RecordId> {
        RecordId::new(&self.name, &self.block, &self.record)
    }
}

/// A type that can be stored in gitdb
pub trait Model: Serialize + DeserializeOwned {
    /// Describe where and how this instance is stored
    fn schema(&self) -> Schema;

    fn base(&self) -> &BaseModel;

    fn base_mut(&mut self) -> &mut BaseModel;

    /// Return every validation problem; an empty list means valid
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }

    /// Whether the record payload must be encrypted at rest
    fn should_encrypt(&self) -> bool {
        false
    }

    /// Compound id, empty until first write
    fn id(&self) -> &str {
        &self.base().id
    }
}

/// Ready-made block naming strategies for [`Schema::block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMethod {
    /// `YYYYMMDD`
    Day,
    /// `YYYYMM`
    Month,
    /// `YYYY`
    Year,
    /// `b<crc32(key) % n>`
    Hash(u32),
}

impl BlockMethod {
    /// Block name for a record created at `created` with business key `key`
    pub fn block_name(&self, created: DateTime<Utc>, key: &str) -> String {
        match self {
            BlockMethod::Day => format!(
                "{:04}{:02}{:02}",
                created.year(),
                created.month(),
                created.day()
            ),
            BlockMethod::Month => format!("{:04}{:02}", created.year(), created.month()),
            BlockMethod::Year => format!("{:04}", created.year()),
            BlockMethod::Hash(buckets) => {
                let bucket = crc32fast::hash(key.as_bytes()) % (*buckets).max(1);
                format!("b{}", bucket)
            }
        }
    }
}
