//! Desired-state records fed to the apply engine

use std::collections::BTreeMap;

use serde::Serialize;

use super::fields::ResourceKind;
use super::value::FieldValue;

/// Why a record was refused before reaching the engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRecord {
    #[error("identifier is empty")]
    EmptyIdentifier,
    #[error("identifier '{id}' is malformed (expected {expected})")]
    MalformedIdentifier { id: String, expected: &'static str },
    #[error("'{name}' could not be resolved: {reason}")]
    Unresolved { name: String, reason: String },
}

/// An input row that never became a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub source_row: usize,
    pub error: InvalidRecord,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.source_row, self.error)
    }
}

/// One desired-state unit: a resolved resource identifier plus the fields to write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    target_id: String,
    fields: BTreeMap<String, FieldValue>,
    source_row: usize,
}

impl Record {
    /// Build a record, normalizing the identifier for the given kind
    pub fn new(
        kind: ResourceKind,
        raw_id: &str,
        fields: BTreeMap<String, FieldValue>,
        source_row: usize,
    ) -> Result<Self, InvalidRecord> {
        let target_id = kind.normalize_id(raw_id)?;
        Ok(Self {
            target_id,
            fields,
            source_row,
        })
    }

    /// Like [`Record::new`], tagging a failure with the source row
    pub fn from_row(
        kind: ResourceKind,
        raw_id: &str,
        fields: BTreeMap<String, FieldValue>,
        source_row: usize,
    ) -> Result<Self, Rejected> {
        Self::new(kind, raw_id, fields, source_row).map_err(|error| Rejected { source_row, error })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn source_row(&self) -> usize {
        self.source_row
    }
}
