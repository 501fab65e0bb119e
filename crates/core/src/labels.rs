//! Label registry: deterministic identifiers for fixture labels.

use fixset_storage::ObjectId;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::FixtureError;

pub use fixset_storage::ID_FIELD;

/// Marker attribute holding the label a document was created from.
pub const LABEL_FIELD: &str = "__fixture_name";

/// Pseudo-label whose attributes other records inherit; never materialized.
pub const DEFAULTS_LABEL: &str = "DEFAULTS";

/// Replaced by the record's own label inside its string attributes.
pub const LABEL_TOKEN: &str = "$LABEL";

/// The identifier a label maps to, independent of its record-set.
///
/// The first 12 bytes of the label's SHA-256 digest, so a label referenced
/// from several fixture files always resolves to the same document.
pub fn identifier_for(label: &str) -> ObjectId {
    let digest = Sha256::digest(label.as_bytes());
    let mut bytes = [0u8; 12];
    bytes.copy_from_slice(&digest[..12]);
    ObjectId::from_bytes(bytes)
}

/// The identifier a labelled record is stored under: its own `_id` when
/// given, otherwise the label's.
pub fn record_identifier(
    context: &str,
    label: &str,
    attributes: &Map<String, Value>,
) -> Result<ObjectId, FixtureError> {
    match attributes.get(ID_FIELD) {
        Some(value) => explicit_id(context, value),
        None => Ok(identifier_for(label)),
    }
}

/// Parse an `_id` written in a fixture.
pub(crate) fn explicit_id(context: &str, value: &Value) -> Result<ObjectId, FixtureError> {
    value
        .as_str()
        .and_then(|s| ObjectId::parse_str(s).ok())
        .ok_or_else(|| {
            FixtureError::definition(
                context,
                format!("_id must be a 24-digit hex string, found {}", value),
            )
        })
}
