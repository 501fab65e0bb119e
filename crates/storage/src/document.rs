use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Attribute holding a document's identifier, as a lowercase hex string.
pub const ID_FIELD: &str = "_id";

/// A 12-byte document identifier in the store's native layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    /// Generate a fresh identifier: 4 bytes of Unix seconds, 5 random bytes
    /// fixed for the process, and a 3-byte counter.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let seconds = time::OffsetDateTime::now_utc().unix_timestamp() as u32;
        let unique = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a 24-digit hexadecimal string.
    pub fn parse_str(s: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidId {
            value: s.to_string(),
        };
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(ObjectId(bytes))
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::String(id.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectId::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A stored document: the model (collection) it belongs to and its
/// attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    model: String,
    attributes: Map<String, Value>,
}

impl Document {
    /// A document holding only its identifier.
    pub fn new(model: impl Into<String>, id: ObjectId) -> Self {
        let mut attributes = Map::new();
        attributes.insert(ID_FIELD.to_string(), id.into());
        Document {
            model: model.into(),
            attributes,
        }
    }

    pub fn from_attributes(model: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Document {
            model: model.into(),
            attributes,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The parsed `_id`, if present and well-formed.
    pub fn id(&self) -> Option<ObjectId> {
        self.attributes
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| ObjectId::parse_str(s).ok())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.attributes.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }
}

/// A conjunction of field-equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::all().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }
}
