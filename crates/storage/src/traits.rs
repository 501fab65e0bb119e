use crate::document::{Document, Filter, ObjectId};
use crate::error::StoreError;

/// The storage trait for fixset document backends.
///
/// Calls are synchronous and complete before returning. Documents are
/// grouped by model name; within a model, insertion order is the order
/// in which documents were first saved.
pub trait DocumentStore {
    /// First document of `model` matching `filter`, in insertion order.
    ///
    /// Several matches are not an error: the earliest saved one wins.
    fn find_one(&self, model: &str, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// All documents of `model` matching `filter`, in insertion order.
    fn find_all(&self, model: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    /// Build an unsaved document. A fresh identifier is generated when
    /// `id` is `None`.
    fn new_document(&self, model: &str, id: Option<ObjectId>) -> Document;

    /// Insert or replace (by `_id`) a document.
    ///
    /// When `validate` is false, store-side validation is skipped.
    fn save(&mut self, document: &Document, validate: bool) -> Result<(), StoreError>;
}
