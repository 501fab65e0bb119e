use std::path::Path;

use fixset_core::{Loader, Schema};
use fixset_storage::MemoryStore;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::commands::overrides;
use crate::OutputFormat;

/// Load record-sets into a fresh in-memory store and print what was stored.
pub(crate) fn cmd_load(
    schema_path: &Path,
    dir: &Path,
    models: &[(String, String)],
    names: &[String],
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let schema = Schema::from_path(schema_path).map_err(|e| e.to_string())?;
    debug!(schema = %schema_path.display(), models = schema.models().count(), "schema loaded");
    let mut store = MemoryStore::new();
    let mut loader = Loader::new(&schema);
    let sets = loader
        .load_fixtures(&mut store, dir, names, &overrides(models))
        .map_err(|e| e.to_string())?;

    if quiet {
        return Ok(());
    }
    match output {
        OutputFormat::Json => {
            let documents: Map<String, Value> = store
                .collections()
                .iter()
                .map(|(model, docs)| {
                    let docs = docs
                        .iter()
                        .map(|d| Value::Object(d.attributes().clone()))
                        .collect();
                    (model.clone(), Value::Array(docs))
                })
                .collect();
            let report = json!({
                "sets": sets
                    .iter()
                    .map(|set| json!({
                        "name": set.name(),
                        "model": set.model(),
                        "records": set.len(),
                    }))
                    .collect::<Vec<_>>(),
                "documents": documents,
                "writes": store.writes(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e))
            );
        }
        OutputFormat::Text => {
            for set in &sets {
                println!("loaded {} ({}): {} records", set.name(), set.model(), set.len());
            }
            for (model, docs) in store.collections() {
                println!("  {}: {} documents", model, docs.len());
            }
            println!("{} writes", store.writes());
        }
    }
    Ok(())
}
