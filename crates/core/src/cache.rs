use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::fixture_set::FixtureSet;

/// Record-sets already materialized, keyed by name.
///
/// `all_loaded` also remembers every set ever registered and survives
/// [`FixtureCache::clear`].
#[derive(Debug, Default)]
pub struct FixtureCache {
    cached: HashMap<String, Arc<FixtureSet>>,
    all_loaded: BTreeMap<String, Arc<FixtureSet>>,
}

impl FixtureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.cached.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<FixtureSet>> {
        self.cached.get(name).cloned()
    }

    /// Cached sets for `names`, in order; `None` where a name is not cached.
    pub fn cached<N: AsRef<str>>(&self, names: &[N]) -> Vec<Option<Arc<FixtureSet>>> {
        names.iter().map(|name| self.get(name.as_ref())).collect()
    }

    pub fn insert(&mut self, set: Arc<FixtureSet>) {
        self.cached.insert(set.name().to_string(), set);
    }

    pub fn register_loaded(&mut self, set: Arc<FixtureSet>) {
        self.all_loaded.insert(set.name().to_string(), set);
    }

    pub fn all_loaded(&self) -> &BTreeMap<String, Arc<FixtureSet>> {
        &self.all_loaded
    }

    pub fn clear(&mut self) {
        self.cached.clear();
    }

    pub fn len(&self) -> usize {
        self.cached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_empty()
    }
}
