//! Document operations produced by the resolver and run by the executor.
//!
//! Documents are named symbolically with [`DocKey`] so a plan can be built
//! without touching the store; the executor binds each key to a concrete
//! identifier as it runs.

use std::fmt;

use fixset_storage::ObjectId;
use serde_json::Value;

/// A document a plan refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocKey {
    /// Found or created through its label marker.
    Labeled { model: String, label: String },
    /// Created fresh by this plan from a nested inline record.
    Anonymous { model: String, slot: usize },
}

impl DocKey {
    pub fn labeled(model: impl Into<String>, label: impl Into<String>) -> Self {
        DocKey::Labeled {
            model: model.into(),
            label: label.into(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            DocKey::Labeled { model, .. } | DocKey::Anonymous { model, .. } => model,
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Labeled { model, label } => write!(f, "{}({})", model, label),
            DocKey::Anonymous { model, slot } => write!(f, "{}#{}", model, slot),
        }
    }
}

/// An attribute value awaiting identifier binding.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanValue {
    Value(Value),
    Ref(DocKey),
    RefList(Vec<DocKey>),
}

/// Ordered field -> value mapping of a planned write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedAttributes {
    entries: Vec<(String, PlanValue)>,
}

impl PlannedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&PlanValue> {
        self.entries.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// The plain JSON value of `field`, if it is not a reference.
    pub fn value(&self, field: &str) -> Option<&Value> {
        match self.get(field) {
            Some(PlanValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Set `field`, replacing an existing value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: PlanValue) {
        let field = field.into();
        match self.entries.iter_mut().find(|(k, _)| *k == field) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<PlanValue> {
        let index = self.entries.iter().position(|(k, _)| k == field)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlanValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PlanValue)> for PlannedAttributes {
    fn from_iter<I: IntoIterator<Item = (String, PlanValue)>>(iter: I) -> Self {
        let mut attributes = PlannedAttributes::new();
        for (field, value) in iter {
            attributes.insert(field, value);
        }
        attributes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Find the document of `model` labelled `label`, or create a
    /// placeholder with identifier `id`.
    Ensure {
        model: String,
        label: String,
        id: ObjectId,
    },
    /// Start a new unlabelled document; saved by its `Merge`.
    Create {
        model: String,
        slot: usize,
        id: Option<ObjectId>,
    },
    /// Merge attributes into a document and save it.
    Merge {
        target: DocKey,
        attributes: PlannedAttributes,
    },
}

/// The operations needed to materialize one fixture record, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    operations: Vec<Operation>,
    root: Option<DocKey>,
}

impl Plan {
    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The record the plan was built for.
    pub fn root(&self) -> Option<&DocKey> {
        self.root.as_ref()
    }

    pub(crate) fn set_root(&mut self, key: DocKey) {
        self.root = Some(key);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The merge targeting `key`, if any.
    pub fn merge_for(&self, key: &DocKey) -> Option<&PlannedAttributes> {
        self.operations.iter().find_map(|op| match op {
            Operation::Merge { target, attributes } if target == key => Some(attributes),
            _ => None,
        })
    }
}
