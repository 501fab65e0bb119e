use fixset_core::identifier_for;
use serde_json::{Map, Value};

use crate::OutputFormat;

pub(crate) fn cmd_ids(labels: &[String], output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let ids: Map<String, Value> = labels
                .iter()
                .map(|label| (label.clone(), Value::from(identifier_for(label))))
                .collect();
            println!("{}", Value::Object(ids));
        }
        OutputFormat::Text => {
            let width = labels.iter().map(String::len).max().unwrap_or(0);
            for label in labels {
                println!("{:width$}  {}", label, identifier_for(label), width = width);
            }
        }
    }
}
