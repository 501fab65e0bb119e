use std::path::Path;

use fixset_storage::ObjectId;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FixtureError;
use crate::labels::record_identifier;
use crate::parser::{read_records, RawRecords};

/// A named collection of fixture records bound for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureSet {
    name: String,
    model: String,
    records: RawRecords,
}

impl FixtureSet {
    /// Read record-set `name` from `dir`.
    pub fn load(dir: &Path, name: &str, model: impl Into<String>) -> Result<Self, FixtureError> {
        Ok(FixtureSet {
            name: name.to_string(),
            model: model.into(),
            records: read_records(dir, name)?,
        })
    }

    /// Build a set from already prepared records.
    pub fn from_records(name: impl Into<String>, model: impl Into<String>, records: RawRecords) -> Self {
        FixtureSet {
            name: name.into(),
            model: model.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn records(&self) -> &RawRecords {
        &self.records
    }

    /// Raw attributes of the record labelled `label`.
    pub fn get(&self, label: &str) -> Option<&Map<String, Value>> {
        self.records.get(label).and_then(Value::as_object)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Identifier the record labelled `label` is stored under: its pinned
    /// `_id` if it has one, else the label's. `None` for unknown labels.
    pub fn identifier(&self, label: &str) -> Result<Option<ObjectId>, FixtureError> {
        let Some(attributes) = self.get(label) else {
            return Ok(None);
        };
        let context = format!("{}({})", self.model, label);
        record_identifier(&context, label, attributes).map(Some)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
