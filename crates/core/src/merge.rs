//! Document merger: folds fixture attributes into a stored document and
//! saves it with validation disabled.
//!
//! Merge rules, per field present on either side:
//!
//! - if either side is a list, the result is the new list followed by the
//!   existing one (duplicates kept);
//! - otherwise a new value that is neither null nor `false` overwrites;
//!   anything else leaves the existing value alone.
//!
//! An incoming `_id` never replaces an existing one.

use fixset_storage::{Document, DocumentStore, Filter, ObjectId};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::FixtureError;
use crate::labels::{identifier_for, ID_FIELD, LABEL_FIELD};
use crate::resolve::polymorphic_target;
use crate::schema::{ModelSchema, RelationKind};

/// Merge `attributes` into `document`, tidy newly assigned embedded
/// documents, and save.
pub fn merge_document<S, M>(
    store: &mut S,
    schema: &M,
    mut document: Document,
    mut attributes: Map<String, Value>,
) -> Result<Document, FixtureError>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    if document.contains(ID_FIELD) {
        attributes.shift_remove(ID_FIELD);
    }
    let before = document.attributes().clone();
    merge_attributes(document.attributes_mut(), attributes);

    let model = document.model().to_string();
    sanitize_embedded(store, schema, &model, document.attributes_mut(), Some(&before))?;

    store.save(&document, false)?;
    debug!(model = %model, id = ?document.id(), "merged fixture document");
    Ok(document)
}

/// Apply the list-concatenation and truthy-overwrite rules in place.
pub fn merge_attributes(existing: &mut Map<String, Value>, mut incoming: Map<String, Value>) {
    let mut keys: Vec<String> = incoming.keys().cloned().collect();
    keys.extend(existing.keys().filter(|k| !incoming.contains_key(*k)).cloned());

    for key in keys {
        let new = incoming.shift_remove(&key);
        let new_is_list = matches!(new, Some(Value::Array(_)));
        let old_is_list = matches!(existing.get(&key), Some(Value::Array(_)));

        if new_is_list || old_is_list {
            let mut merged = into_list(new);
            merged.extend(into_list(existing.shift_remove(&key)));
            existing.insert(key, Value::Array(merged));
        } else if let Some(value) = new.filter(is_truthy) {
            existing.insert(key, value);
        }
    }
}

fn into_list(value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Walk the embedded relations of `model` in `attributes`.
///
/// `before` is the document's previous state; `None` means the document is
/// new, which is always the case for embedded documents. Embedded
/// documents that are new or changed lose their `_id` and any field equal
/// to its declared default. Belongs-to references inside new embedded
/// documents are resolved by label.
fn sanitize_embedded<S, M>(
    store: &mut S,
    schema: &M,
    model: &str,
    attributes: &mut Map<String, Value>,
    before: Option<&Map<String, Value>>,
) -> Result<(), FixtureError>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    for relation in schema.relations_of(model) {
        match relation.kind {
            RelationKind::EmbedsOne => {
                if !assigned(attributes, before, &relation.name) {
                    continue;
                }
                if let Some(Value::Object(embedded)) = attributes.get_mut(&relation.name) {
                    strip_embedded(store, schema, &relation.target, embedded)?;
                }
            }
            RelationKind::EmbedsMany => {
                if !assigned(attributes, before, &relation.name) {
                    continue;
                }
                if let Some(Value::Array(items)) = attributes.get_mut(&relation.name) {
                    for item in items.iter_mut() {
                        if let Value::Object(embedded) = item {
                            strip_embedded(store, schema, &relation.target, embedded)?;
                        }
                    }
                }
            }
            RelationKind::BelongsTo if before.is_none() => {
                let Some(value) = attributes.shift_remove(&relation.name) else {
                    continue;
                };
                let context = format!("embedded {}.{}", model, relation.name);
                let reference = match value {
                    Value::Null => continue,
                    Value::String(reference) => reference,
                    Value::Object(_) => {
                        return Err(FixtureError::definition(
                            context,
                            "cannot create a nested document inside an embedded document",
                        ))
                    }
                    other => {
                        return Err(FixtureError::definition(
                            context,
                            format!("expected a label, found {}", other),
                        ))
                    }
                };
                let (label, target) = if relation.polymorphic {
                    let (label, target, hinted) =
                        polymorphic_target(schema, &context, &reference, relation)?;
                    if hinted {
                        if let Some(discriminator) = &relation.discriminator {
                            attributes.insert(discriminator.clone(), Value::String(target.clone()));
                        }
                    }
                    (label, target)
                } else {
                    (reference, relation.target.clone())
                };
                let doc = find_or_create_by_label(store, &target, &label, identifier_for(&label))?;
                let id = doc
                    .id()
                    .ok_or_else(|| FixtureError::UnboundReference(format!("{}({})", target, label)))?;
                attributes.insert(relation.foreign_key.clone(), id.into());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Whether `field` holds a non-null value that is new or differs from
/// `before`.
fn assigned(
    attributes: &Map<String, Value>,
    before: Option<&Map<String, Value>>,
    field: &str,
) -> bool {
    match attributes.get(field) {
        None | Some(Value::Null) => false,
        Some(current) => before.map_or(true, |b| b.get(field) != Some(current)),
    }
}

fn strip_embedded<S, M>(
    store: &mut S,
    schema: &M,
    model: &str,
    embedded: &mut Map<String, Value>,
) -> Result<(), FixtureError>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    sanitize_embedded(store, schema, model, embedded, None)?;
    embedded.shift_remove(ID_FIELD);
    if let Some(defaults) = schema.field_defaults(model) {
        for (field, default) in defaults {
            if field != ID_FIELD && !default.is_null() && embedded.get(field) == Some(default) {
                embedded.shift_remove(field);
            }
        }
    }
    Ok(())
}

/// The document of `model` marked with `label`, or a new placeholder with
/// identifier `id` saved right away.
///
/// When several documents carry the label, the first one stored wins.
pub fn find_or_create_by_label<S>(
    store: &mut S,
    model: &str,
    label: &str,
    id: ObjectId,
) -> Result<Document, FixtureError>
where
    S: DocumentStore + ?Sized,
{
    let mut matches = store.find_all(model, &Filter::eq(LABEL_FIELD, label))?;
    if matches.len() > 1 {
        warn!(model, label, count = matches.len(), "label matches several documents; using the first");
    }
    if !matches.is_empty() {
        return Ok(matches.swap_remove(0));
    }

    let mut document = store.new_document(model, Some(id));
    document.set(LABEL_FIELD, Value::String(label.to_string()));
    store.save(&document, false)?;
    debug!(model, label, id = %id, "created placeholder document");
    Ok(document)
}
