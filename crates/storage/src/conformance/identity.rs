use super::{expect_id, TestResult};
use crate::{DocumentStore, Filter, ObjectId, ID_FIELD};

pub(super) fn run_identity_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "identity",
            "new_document_uses_given_id",
            new_document_uses_given_id(factory),
        ),
        TestResult::from_result(
            "identity",
            "new_document_generates_distinct_ids",
            new_document_generates_distinct_ids(factory),
        ),
        TestResult::from_result(
            "identity",
            "new_document_is_not_saved",
            new_document_is_not_saved(factory),
        ),
        TestResult::from_result(
            "identity",
            "saved_id_is_findable",
            saved_id_is_findable(factory),
        ),
    ]
}

fn new_document_uses_given_id<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let s = factory();
    let id = ObjectId::from_bytes([7; 12]);
    let doc = s.new_document("User", Some(id));
    if doc.id() != Some(id) {
        return Err(format!("expected id {}, got {:?}", id, doc.id()));
    }
    if doc.model() != "User" {
        return Err(format!("expected model User, got {}", doc.model()));
    }
    Ok(())
}

fn new_document_generates_distinct_ids<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let s = factory();
    let a = expect_id(&s.new_document("User", None))?;
    let b = expect_id(&s.new_document("User", None))?;
    if a == b {
        return Err(format!("two new documents share id {}", a));
    }
    Ok(())
}

fn new_document_is_not_saved<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let s = factory();
    s.new_document("User", None);
    let all = s
        .find_all("User", &Filter::all())
        .map_err(|e| e.to_string())?;
    if !all.is_empty() {
        return Err(format!("new_document persisted {} documents", all.len()));
    }
    Ok(())
}

fn saved_id_is_findable<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut s = factory();
    let id = ObjectId::from_bytes([9; 12]);
    let doc = s.new_document("User", Some(id));
    s.save(&doc, false).map_err(|e| e.to_string())?;
    let found = s
        .find_one("User", &Filter::eq(ID_FIELD, id))
        .map_err(|e| e.to_string())?;
    match found {
        Some(d) if d.id() == Some(id) => Ok(()),
        other => Err(format!("expected document {}, got {:?}", id, other)),
    }
}
