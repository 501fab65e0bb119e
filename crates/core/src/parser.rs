//! Record parser: fixture files to label-keyed raw attribute mappings.
//!
//! A record-set `name` under `dir` is read from every `*.yml` / `*.yaml`
//! file below `dir/name/` (sorted by path), then from `dir/name.yml` or
//! `dir/name.yaml`. All files share one label space; a label defined
//! again replaces its attributes but keeps its first position.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::FixtureError;
use crate::labels::{DEFAULTS_LABEL, LABEL_TOKEN};

/// YAML merge key, usually `<<: *DEFAULTS`.
const MERGE_KEY: &str = "<<";

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Label -> attributes, in definition order. Every value is an object.
pub type RawRecords = Map<String, Value>;

/// Every file contributing to record-set `name`, in read order.
pub fn source_files(dir: &Path, name: &str) -> Result<Vec<PathBuf>, FixtureError> {
    let base = glob::Pattern::escape(&dir.join(name).to_string_lossy());
    let mut nested = Vec::new();
    for ext in EXTENSIONS {
        let pattern = format!("{}/**/*.{}", base, ext);
        for entry in glob::glob(&pattern)?.flatten() {
            if entry.is_file() {
                nested.push(entry);
            }
        }
    }
    nested.sort();

    for ext in EXTENSIONS {
        let top = dir.join(format!("{}.{}", name, ext));
        if top.is_file() {
            nested.push(top);
        }
    }
    Ok(nested)
}

/// Read, merge, and prepare every record of record-set `name`.
pub fn read_records(dir: &Path, name: &str) -> Result<RawRecords, FixtureError> {
    let files = source_files(dir, name)?;
    if files.is_empty() {
        return Err(FixtureError::MissingSource {
            name: name.to_string(),
            dir: dir.to_path_buf(),
        });
    }

    let mut records = RawRecords::new();
    for path in &files {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = parse_document(path, &content)?;
        debug!(file = %path.display(), records = parsed.len(), "read fixture file");
        for (label, attributes) in parsed {
            records.insert(label, attributes);
        }
    }
    prepare_records(records)
}

/// Parse one YAML document into label -> record mapping, without any
/// label processing.
pub fn parse_document(path: &Path, content: &str) -> Result<RawRecords, FixtureError> {
    if content.trim().is_empty() {
        return Ok(RawRecords::new());
    }
    let value: Value = serde_yaml::from_str(content).map_err(|source| FixtureError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    let rows = match value {
        Value::Null => return Ok(RawRecords::new()),
        Value::Object(rows) => rows,
        other => {
            return Err(FixtureError::definition(
                path.display().to_string(),
                format!("expected a mapping of labels to records, found {}", kind_of(&other)),
            ))
        }
    };

    let mut records = RawRecords::new();
    for (label, row) in rows {
        let attributes = match row {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(FixtureError::definition(
                    format!("{}:{}", path.display(), label),
                    format!("expected a mapping of attributes, found {}", kind_of(&other)),
                ))
            }
        };
        records.insert(label, Value::Object(attributes));
    }
    Ok(records)
}

/// Drop `DEFAULTS`, expand merge keys, interpolate labels.
pub fn prepare_records(records: RawRecords) -> Result<RawRecords, FixtureError> {
    let mut prepared = RawRecords::new();
    for (label, attributes) in records {
        if label == DEFAULTS_LABEL {
            continue;
        }
        let Value::Object(mut attributes) = attributes else {
            return Err(FixtureError::definition(label, "record is not a mapping"));
        };
        expand_merge_keys(&label, &mut attributes)?;
        interpolate_label(&label, &mut attributes);
        prepared.insert(label, Value::Object(attributes));
    }
    Ok(prepared)
}

/// Fold a `<<` entry (one mapping or a list of them) into the record.
/// Keys the record sets itself win; earlier mappings in a list win over
/// later ones.
pub fn expand_merge_keys(label: &str, attributes: &mut Map<String, Value>) -> Result<(), FixtureError> {
    let Some(inherited) = attributes.shift_remove(MERGE_KEY) else {
        return Ok(());
    };
    let sources = match inherited {
        Value::Object(map) => vec![map],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(FixtureError::definition(
                    label,
                    format!("merge key entries must be mappings, found {}", kind_of(&other)),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::Null => Vec::new(),
        other => {
            return Err(FixtureError::definition(
                label,
                format!("merge key must be a mapping, found {}", kind_of(&other)),
            ))
        }
    };

    let own = std::mem::take(attributes);
    for source in sources {
        for (key, value) in source {
            if !attributes.contains_key(&key) {
                attributes.insert(key, value);
            }
        }
    }
    for (key, value) in own {
        attributes.insert(key, value);
    }
    Ok(())
}

/// Replace `$LABEL` with `label` in the record's top-level string values.
pub fn interpolate_label(label: &str, attributes: &mut Map<String, Value>) {
    for value in attributes.values_mut() {
        if let Value::String(s) = value {
            if s.contains(LABEL_TOKEN) {
                *s = s.replace(LABEL_TOKEN, label);
            }
        }
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
