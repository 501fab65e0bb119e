//! Conformance test suite for `DocumentStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `DocumentStore` implementation can run to verify it behaves the way the
//! fixture engine relies on:
//!
//! - **Find**: first-match lookup, model scoping, conjunctive filters
//! - **Save**: upsert by `_id`, missing or malformed identifiers
//! - **Identity**: caller-supplied and generated identifiers
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use fixset_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn my_store_conformance() {
//!     let report = run_conformance_suite(|| MyStore::connect_test_db());
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod find;
mod identity;
mod save;

use std::fmt;

use serde_json::{json, Value};

use crate::{Document, DocumentStore, ObjectId};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "find", "save").
    pub category: String,
    /// Test name (e.g. "find_one_first_match_wins").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.extend(find::run_find_tests(&factory));
    results.extend(save::run_save_tests(&factory));
    results.extend(identity::run_identity_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Build and save a document of `model` with the given extra attributes.
fn insert<S: DocumentStore>(
    store: &mut S,
    model: &str,
    attributes: Value,
) -> Result<Document, String> {
    let mut doc = store.new_document(model, None);
    if let Value::Object(map) = attributes {
        for (k, v) in map {
            doc.set(k, v);
        }
    }
    store.save(&doc, false).map_err(|e| format!("save: {e}"))?;
    Ok(doc)
}

fn named(name: &str) -> Value {
    json!({ "name": name })
}

fn expect_id(doc: &Document) -> Result<ObjectId, String> {
    doc.id()
        .ok_or_else(|| format!("document has no parseable _id: {:?}", doc))
}
