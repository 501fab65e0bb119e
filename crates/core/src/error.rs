use std::path::PathBuf;

use fixset_storage::StoreError;

use crate::schema::SchemaError;

/// Errors raised while reading, resolving, or materializing fixtures.
///
/// Nothing is retried: the first error aborts the load, and whatever was
/// merged before it stays persisted.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// A fixture's shape is invalid for its relation context, e.g. a nested
    /// record under a polymorphic belongs-to.
    #[error("invalid fixture {context}: {message}")]
    Definition { context: String, message: String },

    /// The document store failed to persist or look up a document.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// No fixture file exists for a requested record-set.
    #[error("no fixture files for '{name}' under {}", .dir.display())]
    MissingSource { name: String, dir: PathBuf },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("bad fixture path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A resolved plan referenced a document it never created or found.
    #[error("unbound document reference in plan: {0}")]
    UnboundReference(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl FixtureError {
    pub fn definition(context: impl Into<String>, message: impl Into<String>) -> Self {
        FixtureError::Definition {
            context: context.into(),
            message: message.into(),
        }
    }
}
