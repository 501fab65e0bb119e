use std::path::Path;

use fixset_core::inflect::default_model_name;
use fixset_core::FixtureSet;
use serde_json::json;

use crate::commands::overrides;
use crate::OutputFormat;

/// Parse each record-set and list its labels; nothing is resolved or stored.
pub(crate) fn cmd_check(
    dir: &Path,
    models: &[(String, String)],
    names: &[String],
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let overrides = overrides(models);
    let mut sets = Vec::with_capacity(names.len());
    for name in names {
        let model = overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| default_model_name(name));
        let set = FixtureSet::load(dir, name, model).map_err(|e| e.to_string())?;
        sets.push(set);
    }

    if quiet {
        return Ok(());
    }
    match output {
        OutputFormat::Json => {
            let report: Vec<_> = sets
                .iter()
                .map(|set| {
                    json!({
                        "name": set.name(),
                        "model": set.model(),
                        "labels": set.labels().collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e))
            );
        }
        OutputFormat::Text => {
            for set in &sets {
                println!("{} ({}): {} records", set.name(), set.model(), set.len());
                for label in set.labels() {
                    println!("  {}", label);
                }
            }
        }
    }
    Ok(())
}
