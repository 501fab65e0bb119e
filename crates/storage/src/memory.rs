//! In-memory [`DocumentStore`] used by tests and the `fixset` CLI.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::document::{Document, Filter, ObjectId, ID_FIELD};
use crate::error::StoreError;
use crate::traits::DocumentStore;

/// A store-side validation hook, run by `save` only when validation is on.
pub type Validator = Box<dyn Fn(&Document) -> Result<(), String>>;

/// A [`DocumentStore`] keeping every model's documents in an ordered list.
#[derive(Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Vec<Document>>,
    validators: HashMap<String, Vec<Validator>>,
    writes: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator for `model`.
    pub fn with_validator<F>(mut self, model: &str, validator: F) -> Self
    where
        F: Fn(&Document) -> Result<(), String> + 'static,
    {
        self.validators
            .entry(model.to_string())
            .or_default()
            .push(Box::new(validator));
        self
    }

    /// Number of successful `save` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// When on, every `save` fails with [`StoreError::Backend`].
    pub fn fail_writes(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Documents of one model, in insertion order.
    pub fn documents(&self, model: &str) -> &[Document] {
        self.collections.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every model with at least one saved document, sorted by name.
    pub fn collections(&self) -> &BTreeMap<String, Vec<Document>> {
        &self.collections
    }

    /// Total number of stored documents across all models.
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, document: &Document, id: ObjectId) -> Result<(), StoreError> {
        let Some(validators) = self.validators.get(document.model()) else {
            return Ok(());
        };
        for validator in validators {
            validator(document).map_err(|message| StoreError::Validation {
                model: document.model().to_string(),
                id: id.to_hex(),
                message,
            })?;
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, model: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents(model)
            .iter()
            .find(|doc| filter.matches(doc))
            .cloned())
    }

    fn find_all(&self, model: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents(model)
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    fn new_document(&self, model: &str, id: Option<ObjectId>) -> Document {
        Document::new(model, id.unwrap_or_else(ObjectId::new))
    }

    fn save(&mut self, document: &Document, validate: bool) -> Result<(), StoreError> {
        if self.failing {
            return Err(StoreError::Backend("writes are disabled".to_string()));
        }
        let id = match document.get(ID_FIELD) {
            None => {
                return Err(StoreError::MissingId {
                    model: document.model().to_string(),
                })
            }
            Some(value) => match value.as_str() {
                Some(s) => ObjectId::parse_str(s)?,
                None => {
                    return Err(StoreError::InvalidId {
                        value: value.to_string(),
                    })
                }
            },
        };
        if validate {
            self.validate(document, id)?;
        }

        let collection = self.collections.entry(document.model().to_string()).or_default();
        match collection.iter_mut().find(|doc| doc.id() == Some(id)) {
            Some(existing) => *existing = document.clone(),
            None => collection.push(document.clone()),
        }
        self.writes += 1;
        debug!(model = document.model(), id = %id, "saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;
    use serde_json::json;

    #[test]
    fn memory_store_conformance() {
        let report = run_conformance_suite(MemoryStore::new);
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }

    #[test]
    fn validators_run_only_when_requested() {
        let mut store = MemoryStore::new().with_validator("User", |doc| {
            if doc.contains("name") {
                Ok(())
            } else {
                Err("name is required".to_string())
            }
        });
        let doc = store.new_document("User", None);

        let err = store.save(&doc, true).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(store.writes(), 0);

        store.save(&doc, false).unwrap();
        assert_eq!(store.writes(), 1);
        assert_eq!(store.documents("User").len(), 1);
    }

    #[test]
    fn failing_mode_rejects_writes() {
        let mut store = MemoryStore::new();
        store.fail_writes(true);
        let doc = store.new_document("User", None);
        assert!(matches!(
            store.save(&doc, false),
            Err(StoreError::Backend(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn save_counts_every_write() {
        let mut store = MemoryStore::new();
        let mut doc = store.new_document("Group", None);
        store.save(&doc, false).unwrap();
        doc.set("name", json!("Admins"));
        store.save(&doc, false).unwrap();

        assert_eq!(store.writes(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.documents("Group")[0].get("name"), Some(&json!("Admins")));
    }
}
