use serde_json::json;

use super::{expect_id, insert, named, TestResult};
use crate::{DocumentStore, Filter};

pub(super) fn run_find_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "find",
            "find_one_on_empty_store_returns_none",
            find_one_on_empty_store_returns_none(factory),
        ),
        TestResult::from_result(
            "find",
            "find_one_returns_saved_document",
            find_one_returns_saved_document(factory),
        ),
        TestResult::from_result(
            "find",
            "find_one_first_match_wins",
            find_one_first_match_wins(factory),
        ),
        TestResult::from_result(
            "find",
            "find_one_is_scoped_to_model",
            find_one_is_scoped_to_model(factory),
        ),
        TestResult::from_result(
            "find",
            "filter_conditions_are_conjunctive",
            filter_conditions_are_conjunctive(factory),
        ),
        TestResult::from_result(
            "find",
            "find_all_keeps_insertion_order",
            find_all_keeps_insertion_order(factory),
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

fn find_one_on_empty_store_returns_none<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let s = factory();
    match s.find_one("User", &Filter::eq("name", "nobody")) {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

fn find_one_returns_saved_document<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let doc = insert(&mut s, "User", named("alice"))?;
    let found = s
        .find_one("User", &Filter::eq("name", "alice"))
        .map_err(|e| e.to_string())?
        .ok_or("saved document not found")?;
    if found.id() != doc.id() {
        return Err(format!("expected id {:?}, got {:?}", doc.id(), found.id()));
    }
    if found.get("name") != Some(&json!("alice")) {
        return Err(format!("name attribute lost: {:?}", found));
    }
    Ok(())
}

/// Two documents match the filter; the one saved first is returned.
fn find_one_first_match_wins<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let first = insert(&mut s, "User", json!({ "role": "admin", "seq": 1 }))?;
    insert(&mut s, "User", json!({ "role": "admin", "seq": 2 }))?;
    let found = s
        .find_one("User", &Filter::eq("role", "admin"))
        .map_err(|e| e.to_string())?
        .ok_or("no match")?;
    if found.id() != Some(expect_id(&first)?) {
        return Err(format!("expected first saved document, got {:?}", found));
    }
    Ok(())
}

fn find_one_is_scoped_to_model<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    insert(&mut s, "Group", named("admins"))?;
    match s.find_one("User", &Filter::eq("name", "admins")) {
        Ok(None) => Ok(()),
        other => Err(format!("document leaked across models: {:?}", other)),
    }
}

fn filter_conditions_are_conjunctive<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    insert(&mut s, "User", json!({ "name": "alice", "role": "member" }))?;
    let hit = s
        .find_one("User", &Filter::eq("name", "alice").and("role", "member"))
        .map_err(|e| e.to_string())?;
    let miss = s
        .find_one("User", &Filter::eq("name", "alice").and("role", "admin"))
        .map_err(|e| e.to_string())?;
    if hit.is_none() {
        return Err("expected a match when every condition holds".to_string());
    }
    if miss.is_some() {
        return Err("expected no match when one condition fails".to_string());
    }
    Ok(())
}

fn find_all_keeps_insertion_order<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    for name in ["c", "a", "b"] {
        insert(&mut s, "Tag", named(name))?;
    }
    let names: Vec<_> = s
        .find_all("Tag", &Filter::all())
        .map_err(|e| e.to_string())?
        .iter()
        .filter_map(|d| d.get("name").and_then(|v| v.as_str()).map(str::to_owned))
        .collect();
    if names != ["c", "a", "b"] {
        return Err(format!("expected [c, a, b], got {:?}", names));
    }
    Ok(())
}
