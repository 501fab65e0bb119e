//! fixset-core: labelled YAML fixtures for document stores.
//!
//! Reads record-sets of labelled fixture records, resolves their relations
//! into references between documents, and merges them into a
//! [`fixset_storage::DocumentStore`]. Labels map to deterministic
//! identifiers, so a record can be referenced before it is defined.
//!
//! # Public API
//!
//! - [`Loader`] -- load record-sets into a store, with a per-loader cache
//! - [`Schema`] / [`ModelSchema`] -- model relations, defaults, timestamps
//! - [`Resolver`] and [`execute()`] -- the two phases of materializing one record
//! - [`identifier_for()`] -- the identifier a label maps to
//! - [`FixtureError`] -- every failure a load can raise

pub mod cache;
pub mod error;
pub mod execute;
pub mod fixture_set;
pub mod inflect;
pub mod labels;
pub mod loader;
pub mod merge;
pub mod parser;
pub mod plan;
pub mod resolve;
pub mod schema;

// ── Convenience re-exports: key types ────────────────────────────────

pub use cache::FixtureCache;
pub use error::FixtureError;
pub use fixture_set::FixtureSet;
pub use labels::{identifier_for, DEFAULTS_LABEL, ID_FIELD, LABEL_FIELD, LABEL_TOKEN};
pub use loader::Loader;
pub use plan::{DocKey, Operation, Plan, PlanValue, PlannedAttributes};
pub use resolve::Resolver;
pub use schema::{
    ModelDef, ModelSchema, Relation, RelationDef, RelationKind, Schema, SchemaError,
    TimestampStyle, Timestamps,
};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use execute::execute;
pub use loader::materialize_set;
pub use merge::{find_or_create_by_label, merge_attributes, merge_document};
pub use parser::read_records;
