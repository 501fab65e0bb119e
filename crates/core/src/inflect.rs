//! Naming conventions: record-set names to model names, and the default
//! foreign-key names derived from them.

use convert_case::{Case, Casing};

const IRREGULAR: &[(&str, &str)] = &[
    ("people", "person"),
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("mice", "mouse"),
    ("data", "datum"),
];

/// Singular form of an English plural, good enough for collection names.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    for (plural, singular) in IRREGULAR {
        if lower.ends_with(plural) {
            let stem = &word[..word.len() - plural.len()];
            let boundary = stem.is_empty() || stem.ends_with('_');
            if boundary {
                return format!("{}{}", stem, singular);
            }
        }
    }
    if lower.ends_with("ies") && lower.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "xes", "ches", "shes", "zzes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("ss") || lower.ends_with("us") || !lower.ends_with('s') {
        return word.to_string();
    }
    word[..word.len() - 1].to_string()
}

/// `admin_user` -> `AdminUser`.
pub fn camelize(word: &str) -> String {
    word.to_case(Case::Pascal)
}

/// `AdminUser` -> `admin_user`.
pub fn underscore(word: &str) -> String {
    word.to_case(Case::Snake)
}

/// Model a record-set materializes into when no override is given.
pub fn default_model_name(set_name: &str) -> String {
    camelize(&singularize(set_name))
}
