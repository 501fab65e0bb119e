use serde_json::json;

use super::{expect_id, insert, named, TestResult};
use crate::{Document, DocumentStore, Filter, StoreError, ID_FIELD};

pub(super) fn run_save_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "save",
            "save_upserts_by_id",
            save_upserts_by_id(factory),
        ),
        TestResult::from_result(
            "save",
            "save_replaces_whole_document",
            save_replaces_whole_document(factory),
        ),
        TestResult::from_result(
            "save",
            "save_without_id_returns_missing_id",
            save_without_id_returns_missing_id(factory),
        ),
        TestResult::from_result(
            "save",
            "save_with_malformed_id_returns_invalid_id",
            save_with_malformed_id_returns_invalid_id(factory),
        ),
    ]
}

fn save_upserts_by_id<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let mut doc = insert(&mut s, "User", named("alice"))?;
    doc.set("name", json!("alice2"));
    s.save(&doc, false).map_err(|e| e.to_string())?;

    let all = s
        .find_all("User", &Filter::all())
        .map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 document after upsert, got {}", all.len()));
    }
    if all[0].get("name") != Some(&json!("alice2")) {
        return Err(format!("update not visible: {:?}", all[0]));
    }
    Ok(())
}

/// A field dropped from the saved document is gone after re-reading it.
fn save_replaces_whole_document<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let mut doc = insert(&mut s, "User", json!({ "name": "alice", "role": "admin" }))?;
    doc.remove("role");
    s.save(&doc, false).map_err(|e| e.to_string())?;

    let id = expect_id(&doc)?;
    let found = s
        .find_one("User", &Filter::eq(ID_FIELD, id))
        .map_err(|e| e.to_string())?
        .ok_or("document vanished")?;
    if found.contains("role") {
        return Err(format!("stale field survived save: {:?}", found));
    }
    Ok(())
}

fn save_without_id_returns_missing_id<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let doc = Document::from_attributes("User", serde_json::Map::new());
    match s.save(&doc, false) {
        Err(StoreError::MissingId { model }) if model == "User" => Ok(()),
        other => Err(format!("expected MissingId for User, got {:?}", other)),
    }
}

fn save_with_malformed_id_returns_invalid_id<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let mut doc = Document::from_attributes("User", serde_json::Map::new());
    doc.set(ID_FIELD, json!("not-an-id"));
    match s.save(&doc, false) {
        Err(StoreError::InvalidId { .. }) => Ok(()),
        other => Err(format!("expected InvalidId, got {:?}", other)),
    }
}
