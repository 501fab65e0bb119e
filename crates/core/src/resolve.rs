//! Relation resolver: turns one raw fixture record into a [`Plan`].
//!
//! Relation-valued attributes are rewritten into references to other
//! documents: belongs-to into a foreign key on the record, has-many into
//! foreign keys merged into the related documents, has-and-belongs-to-many
//! into id arrays on both sides. Nested mappings become anonymous documents
//! resolved the same way. Embedded relations stay as plain nested values;
//! the merger post-processes them.
//!
//! Resolution never touches the store. The resulting plan is run by
//! [`crate::execute`].

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::FixtureError;
use crate::labels::{explicit_id, identifier_for, record_identifier, ID_FIELD, LABEL_FIELD};
use crate::parser::kind_of;
use crate::plan::{DocKey, Operation, Plan, PlanValue, PlannedAttributes};
use crate::schema::{ModelSchema, Relation, RelationKind};

pub struct Resolver<'a, M: ModelSchema + ?Sized> {
    schema: &'a M,
    timestamp: Value,
}

impl<'a, M: ModelSchema + ?Sized> Resolver<'a, M> {
    /// `now` stamps every timestamp field the resolver fills in.
    pub fn new(schema: &'a M, now: OffsetDateTime) -> Self {
        let timestamp = now
            .format(&Rfc3339)
            .map(Value::String)
            .unwrap_or_else(|_| Value::from(now.unix_timestamp()));
        Resolver { schema, timestamp }
    }

    /// Plan the writes that materialize record `label` of `model`.
    ///
    /// The plan ends with the merge of the record itself.
    pub fn resolve(
        &self,
        label: &str,
        raw: &Map<String, Value>,
        model: &str,
    ) -> Result<Plan, FixtureError> {
        let mut planner = Planner {
            schema: self.schema,
            timestamp: &self.timestamp,
            plan: Plan::default(),
            next_slot: 0,
        };
        let key = planner.labeled_record(label, raw.clone(), model)?;
        planner.plan.set_root(key);
        debug!(label, model, operations = planner.plan.len(), "resolved fixture record");
        Ok(planner.plan)
    }
}

struct Planner<'r, M: ?Sized> {
    schema: &'r M,
    timestamp: &'r Value,
    plan: Plan,
    next_slot: usize,
}

impl<'r, M: ModelSchema + ?Sized> Planner<'r, M> {
    fn labeled_record(
        &mut self,
        label: &str,
        raw: Map<String, Value>,
        model: &str,
    ) -> Result<DocKey, FixtureError> {
        let key = DocKey::labeled(model, label);
        let id = record_identifier(&key.to_string(), label, &raw)?;
        self.plan.push(Operation::Ensure {
            model: model.to_string(),
            label: label.to_string(),
            id,
        });

        let mut seed = PlannedAttributes::new();
        seed.insert(LABEL_FIELD, PlanValue::Value(Value::String(label.to_string())));
        let attributes = self.attributes(raw, model, &key, seed)?;
        self.plan.push(Operation::Merge {
            target: key.clone(),
            attributes,
        });
        Ok(key)
    }

    /// Plan an unlabelled document from a nested mapping. `seed` entries
    /// override the mapping's own attributes.
    fn nested_record(
        &mut self,
        context: &str,
        raw: Map<String, Value>,
        model: &str,
        seed: PlannedAttributes,
    ) -> Result<DocKey, FixtureError> {
        let id = raw
            .get(ID_FIELD)
            .map(|value| explicit_id(context, value))
            .transpose()?;
        let slot = self.next_slot;
        self.next_slot += 1;
        self.plan.push(Operation::Create {
            model: model.to_string(),
            slot,
            id,
        });
        let key = DocKey::Anonymous {
            model: model.to_string(),
            slot,
        };

        let attributes = self.attributes(raw, model, &key, seed)?;
        self.plan.push(Operation::Merge {
            target: key.clone(),
            attributes,
        });
        Ok(key)
    }

    fn ensure(&mut self, model: &str, label: &str) -> DocKey {
        self.plan.push(Operation::Ensure {
            model: model.to_string(),
            label: label.to_string(),
            id: identifier_for(label),
        });
        DocKey::labeled(model, label)
    }

    fn attributes(
        &mut self,
        raw: Map<String, Value>,
        model: &str,
        key: &DocKey,
        seed: PlannedAttributes,
    ) -> Result<PlannedAttributes, FixtureError> {
        let mut attributes: PlannedAttributes = raw
            .into_iter()
            .map(|(field, value)| (field, PlanValue::Value(value)))
            .collect();
        for (field, value) in seed.iter() {
            attributes.insert(field, value.clone());
        }
        attributes.insert(ID_FIELD, PlanValue::Ref(key.clone()));
        self.stamp(model, &mut attributes);

        let schema = self.schema;
        for relation in schema.relations_of(model) {
            match relation.kind {
                RelationKind::BelongsTo => self.belongs_to(&mut attributes, relation, key)?,
                RelationKind::HasMany => self.has_many(&mut attributes, relation, model, key)?,
                RelationKind::HasAndBelongsToMany => {
                    self.has_and_belongs_to_many(&mut attributes, relation, key)?
                }
                RelationKind::EmbedsOne | RelationKind::EmbedsMany => {}
            }
        }
        Ok(attributes)
    }

    fn stamp(&self, model: &str, attributes: &mut PlannedAttributes) {
        let timestamps = self.schema.timestamps(model);
        for field in [timestamps.created_field(), timestamps.updated_field()]
            .into_iter()
            .flatten()
        {
            if !attributes.contains(field) {
                attributes.insert(field, PlanValue::Value(self.timestamp.clone()));
            }
        }
    }

    fn belongs_to(
        &mut self,
        attributes: &mut PlannedAttributes,
        relation: &Relation,
        owner: &DocKey,
    ) -> Result<(), FixtureError> {
        let Some(value) = take_value(attributes, &relation.name) else {
            return Ok(());
        };
        let context = format!("{}.{}", owner, relation.name);

        match value {
            Value::Null => Ok(()),
            Value::Object(map) => {
                if relation.polymorphic {
                    return Err(FixtureError::definition(
                        context,
                        "cannot create a document from nested attributes in a polymorphic relation",
                    ));
                }
                let key = self.nested_record(&context, map, &relation.target, PlannedAttributes::new())?;
                attributes.insert(&relation.foreign_key, PlanValue::Ref(key));
                Ok(())
            }
            Value::String(reference) => {
                let (label, model) = if relation.polymorphic {
                    let (label, model, hinted) =
                        polymorphic_target(self.schema, &context, &reference, relation)?;
                    if let Some(discriminator) = relation.discriminator.as_ref().filter(|_| hinted) {
                        attributes.insert(discriminator, PlanValue::Value(Value::String(model.clone())));
                    }
                    (label, model)
                } else {
                    (reference, relation.target.clone())
                };
                let key = self.ensure(&model, &label);
                attributes.insert(&relation.foreign_key, PlanValue::Ref(key));
                Ok(())
            }
            other => Err(FixtureError::definition(
                context,
                format!("expected a label or a nested record, found {}", kind_of(&other)),
            )),
        }
    }

    fn has_many(
        &mut self,
        attributes: &mut PlannedAttributes,
        relation: &Relation,
        owner_model: &str,
        owner: &DocKey,
    ) -> Result<(), FixtureError> {
        let context = format!("{}.{}", owner, relation.name);
        let Some(items) = take_list(attributes, &relation.name, &context)? else {
            return Ok(());
        };

        for item in items {
            let mut link = PlannedAttributes::new();
            link.insert(&relation.foreign_key, PlanValue::Ref(owner.clone()));
            if relation.polymorphic {
                if let Some(discriminator) = &relation.discriminator {
                    link.insert(
                        discriminator,
                        PlanValue::Value(Value::String(owner_model.to_string())),
                    );
                }
            }

            match item {
                Value::Object(map) => {
                    self.nested_record(&context, map, &relation.target, link)?;
                }
                Value::String(label) => {
                    let key = self.ensure(&relation.target, &label);
                    self.plan.push(Operation::Merge {
                        target: key,
                        attributes: link,
                    });
                }
                other => {
                    return Err(FixtureError::definition(
                        context,
                        format!("expected labels or nested records, found {}", kind_of(&other)),
                    ))
                }
            }
        }
        Ok(())
    }

    fn has_and_belongs_to_many(
        &mut self,
        attributes: &mut PlannedAttributes,
        relation: &Relation,
        owner: &DocKey,
    ) -> Result<(), FixtureError> {
        let context = format!("{}.{}", owner, relation.name);
        let Some(items) = take_list(attributes, &relation.name, &context)? else {
            return Ok(());
        };
        let Some(inverse) = relation.inverse_foreign_key.as_deref() else {
            return Err(FixtureError::definition(
                context,
                "relation has no inverse foreign key",
            ));
        };

        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let mut link = PlannedAttributes::new();
            link.insert(inverse, PlanValue::RefList(vec![owner.clone()]));

            match item {
                Value::Object(map) => {
                    keys.push(self.nested_record(&context, map, &relation.target, link)?);
                }
                Value::String(label) => {
                    let key = self.ensure(&relation.target, &label);
                    keys.push(key.clone());
                    self.plan.push(Operation::Merge {
                        target: key,
                        attributes: link,
                    });
                }
                other => {
                    return Err(FixtureError::definition(
                        context,
                        format!("expected labels or nested records, found {}", kind_of(&other)),
                    ))
                }
            }
        }
        attributes.insert(&relation.foreign_key, PlanValue::RefList(keys));
        Ok(())
    }
}

/// Remove `field` if it holds a plain value.
fn take_value(attributes: &mut PlannedAttributes, field: &str) -> Option<Value> {
    match attributes.get(field) {
        Some(PlanValue::Value(_)) => match attributes.remove(field) {
            Some(PlanValue::Value(value)) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

/// Remove a list-valued relation field. `None` when absent or null.
fn take_list(
    attributes: &mut PlannedAttributes,
    field: &str,
    context: &str,
) -> Result<Option<Vec<Value>>, FixtureError> {
    match take_value(attributes, field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(FixtureError::definition(
            context,
            format!("expected a list, found {}", kind_of(&other)),
        )),
    }
}

/// Label and model a polymorphic belongs-to reference points at, and
/// whether the model came from a `(Type)` hint.
///
/// A hint must name a known model. Without one the relation's declared
/// target is used, which must be known too.
pub(crate) fn polymorphic_target<M: ModelSchema + ?Sized>(
    schema: &M,
    context: &str,
    reference: &str,
    relation: &Relation,
) -> Result<(String, String, bool), FixtureError> {
    match split_type_hint(reference) {
        Some((label, type_name)) => {
            if !schema.has_model(&type_name) {
                return Err(FixtureError::definition(
                    context,
                    format!("unknown type '{}' in reference '{}'", type_name, reference),
                ));
            }
            Ok((label, type_name, true))
        }
        None if schema.has_model(&relation.target) => {
            Ok((reference.to_string(), relation.target.clone(), false))
        }
        None => Err(FixtureError::definition(
            context,
            format!(
                "polymorphic reference '{}' needs a type hint, e.g. '{} (Type)'",
                reference, reference
            ),
        )),
    }
}

/// Split `"bob (Admin)"` into `("bob", "Admin")`. The parenthetical and
/// the whitespace around it are removed from the label.
pub fn split_type_hint(reference: &str) -> Option<(String, String)> {
    let open = reference.find('(')?;
    let close = open + reference[open..].find(')')?;
    let type_name = reference[open + 1..close].trim().to_string();
    let label = format!(
        "{}{}",
        reference[..open].trim_end(),
        reference[close + 1..].trim_start()
    );
    Some((label, type_name))
}
