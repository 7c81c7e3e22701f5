//! Records and their stored envelope
//!
//! A block maps each compound id to a text payload. The payload is a JSON
//! envelope holding the model data next to the values of its indexed fields,
//! or that envelope sealed by [`Cipher`] when the model is sensitive.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::{is_sealed, Cipher};
use crate::errors::{DbError, DbResult};

/// One stored record. Immutable once read; writes replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Compound id
    pub id: String,
    /// Stored payload, possibly sealed
    pub data: String,
    pub dataset: String,
}

/// Decoded record payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Indexed field values captured at write time
    #[serde(default)]
    pub indexes: BTreeMap<String, Value>,
    /// Serialized model
    pub data: Value,
}

impl Envelope {
    /// Capture a model and its index values
    pub fn from_model<M: Serialize>(model: &M, indexes: BTreeMap<String, Value>) -> DbResult<Self> {
        Ok(Self {
            indexes,
            data: serde_json::to_value(model)?,
        })
    }

    /// Serialize to the payload stored in a block
    pub fn to_payload(&self) -> DbResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize the model held by this envelope
    pub fn hydrate<M: DeserializeOwned>(&self, id: &str) -> DbResult<M> {
        M::deserialize(&self.data).map_err(|e| DbError::BadRecord {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Record {
    pub fn new(id: impl Into<String>, data: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            dataset: dataset.into(),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        is_sealed(&self.data)
    }

    /// Decode the payload, unsealing it first if needed.
    ///
    /// Any failure is reported as `BadRecord` for this id only.
    pub fn open(&self, cipher: Option<&Cipher>) -> DbResult<Envelope> {
        let bad = |reason: String| DbError::BadRecord {
            id: self.id.clone(),
            reason,
        };

        let plain = if self.is_encrypted() {
            let cipher = cipher.ok_or_else(|| bad("record is encrypted and no key is configured".into()))?;
            cipher.decrypt(&self.data).map_err(|e| bad(e.to_string()))?
        } else {
            self.data.clone()
        };

        serde_json::from_str(&plain).map_err(|e| bad(e.to_string()))
    }

    /// Decode straight into a model
    pub fn hydrate<M: DeserializeOwned>(&self, cipher: Option<&Cipher>) -> DbResult<M> {
        self.open(cipher)?.hydrate(&self.id)
    }
}
