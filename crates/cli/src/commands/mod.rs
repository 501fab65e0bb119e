pub(crate) mod check;
pub(crate) mod ids;
pub(crate) mod load;

use std::collections::BTreeMap;

/// `--model set=Model` pairs as the loader's override table.
pub(crate) fn overrides(models: &[(String, String)]) -> BTreeMap<String, String> {
    models.iter().cloned().collect()
}
