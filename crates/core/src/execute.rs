//! Plan executor: binds a [`Plan`]'s document keys to identifiers and
//! performs its writes through the merger.

use std::collections::HashMap;

use fixset_storage::{Document, DocumentStore, ObjectId};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::FixtureError;
use crate::labels::identifier_for;
use crate::merge::{find_or_create_by_label, merge_document};
use crate::plan::{DocKey, Operation, Plan, PlanValue, PlannedAttributes};
use crate::schema::ModelSchema;

/// Run every operation of `plan` in order. Returns the identifier bound to
/// the plan's root record, if it has one.
pub fn execute<S, M>(store: &mut S, schema: &M, plan: &Plan) -> Result<Option<ObjectId>, FixtureError>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    let mut run = Execution {
        store,
        schema,
        bindings: HashMap::new(),
        pending: HashMap::new(),
    };
    for operation in plan.operations() {
        run.apply(operation)?;
    }
    Ok(plan.root().and_then(|key| run.bindings.get(key).copied()))
}

struct Execution<'a, S: ?Sized, M: ?Sized> {
    store: &'a mut S,
    schema: &'a M,
    bindings: HashMap<DocKey, ObjectId>,
    /// Created but not yet merged anonymous documents.
    pending: HashMap<DocKey, Document>,
}

impl<'a, S, M> Execution<'a, S, M>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    fn apply(&mut self, operation: &Operation) -> Result<(), FixtureError> {
        match operation {
            Operation::Ensure { model, label, id } => {
                let doc = find_or_create_by_label(self.store, model, label, *id)?;
                self.bind(DocKey::labeled(model.as_str(), label.as_str()), &doc)?;
            }
            Operation::Create { model, slot, id } => {
                let key = DocKey::Anonymous {
                    model: model.clone(),
                    slot: *slot,
                };
                let doc = self.store.new_document(model, *id);
                self.bind(key.clone(), &doc)?;
                self.pending.insert(key, doc);
            }
            Operation::Merge { target, attributes } => {
                let document = self.target(target)?;
                let values = self.resolve_values(attributes)?;
                let merged = merge_document(self.store, self.schema, document, values)?;
                self.bind(target.clone(), &merged)?;
                debug!(target = %target, "merged plan attributes");
            }
        }
        Ok(())
    }

    fn target(&mut self, key: &DocKey) -> Result<Document, FixtureError> {
        match key {
            DocKey::Labeled { model, label } => {
                let id = self
                    .bindings
                    .get(key)
                    .copied()
                    .unwrap_or_else(|| identifier_for(label));
                find_or_create_by_label(self.store, model, label, id)
            }
            DocKey::Anonymous { .. } => self
                .pending
                .remove(key)
                .ok_or_else(|| FixtureError::UnboundReference(key.to_string())),
        }
    }

    fn bind(&mut self, key: DocKey, doc: &Document) -> Result<(), FixtureError> {
        let id = doc
            .id()
            .ok_or_else(|| FixtureError::UnboundReference(key.to_string()))?;
        self.bindings.insert(key, id);
        Ok(())
    }

    fn id_of(&self, key: &DocKey) -> Result<Value, FixtureError> {
        self.bindings
            .get(key)
            .map(|id| Value::from(*id))
            .ok_or_else(|| FixtureError::UnboundReference(key.to_string()))
    }

    fn resolve_values(&self, attributes: &PlannedAttributes) -> Result<Map<String, Value>, FixtureError> {
        let mut values = Map::new();
        for (field, value) in attributes.iter() {
            let value = match value {
                PlanValue::Value(v) => v.clone(),
                PlanValue::Ref(key) => self.id_of(key)?,
                PlanValue::RefList(keys) => Value::Array(
                    keys.iter()
                        .map(|key| self.id_of(key))
                        .collect::<Result<_, _>>()?,
                ),
            };
            values.insert(field.to_string(), value);
        }
        Ok(values)
    }
}
