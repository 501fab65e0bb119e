//! fixset-storage: the document store collaborator for fixset.
//!
//! Defines the [`DocumentStore`] trait the fixture engine writes through,
//! the [`Document`] / [`ObjectId`] / [`Filter`] types it exchanges, an
//! in-memory [`MemoryStore`], and a [`conformance`] suite any backend can
//! run to check it behaves the way the engine expects.

pub mod conformance;
mod document;
mod error;
mod memory;
mod traits;

pub use document::{Document, Filter, ObjectId, ID_FIELD};
pub use error::StoreError;
pub use memory::{MemoryStore, Validator};
pub use traits::DocumentStore;
