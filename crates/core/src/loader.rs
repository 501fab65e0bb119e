//! Fixture-set loader: reads record-sets, materializes them into a store,
//! and remembers which sets are already loaded.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use fixset_storage::DocumentStore;
use serde_json::Map;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::cache::FixtureCache;
use crate::error::FixtureError;
use crate::execute::execute;
use crate::fixture_set::FixtureSet;
use crate::inflect::default_model_name;
use crate::resolve::Resolver;
use crate::schema::ModelSchema;

/// Loads fixture record-sets against one schema.
///
/// The loader owns its [`FixtureCache`]; each instance is an independent
/// cache scope.
pub struct Loader<'s, M: ModelSchema + ?Sized> {
    schema: &'s M,
    cache: FixtureCache,
    clock: Option<OffsetDateTime>,
}

impl<'s, M: ModelSchema + ?Sized> Loader<'s, M> {
    pub fn new(schema: &'s M) -> Self {
        Loader {
            schema,
            cache: FixtureCache::new(),
            clock: None,
        }
    }

    /// Use a fixed instant for timestamp fields instead of the current time.
    pub fn with_clock(mut self, now: OffsetDateTime) -> Self {
        self.clock = Some(now);
        self
    }

    /// Load record-sets `names` from `dir` into `store`.
    ///
    /// Sets already cached are not re-read or re-written. When nothing new is
    /// requested the cached sets are returned as-is. `overrides` maps a set
    /// name to its model; other sets use the model derived from their name.
    ///
    /// Returns one set per requested name, in request order.
    pub fn load_fixtures<S, N>(
        &mut self,
        store: &mut S,
        dir: &Path,
        names: &[N],
        overrides: &BTreeMap<String, String>,
    ) -> Result<Vec<Arc<FixtureSet>>, FixtureError>
    where
        S: DocumentStore + ?Sized,
        N: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let pending: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.cache.is_loaded(name))
            .filter(|name| seen.insert(*name))
            .collect();

        if pending.is_empty() {
            debug!(count = names.len(), "all fixture sets already cached");
            return self.collect(names);
        }

        let mut loaded = Vec::with_capacity(pending.len());
        for name in &pending {
            let model = overrides
                .get(*name)
                .cloned()
                .unwrap_or_else(|| default_model_name(name));
            loaded.push(Arc::new(FixtureSet::load(dir, name, model)?));
        }
        for set in &loaded {
            self.cache.register_loaded(set.clone());
        }

        let now = self.clock.unwrap_or_else(OffsetDateTime::now_utc);
        for set in &loaded {
            materialize_set(store, self.schema, set, now)?;
        }

        for set in loaded {
            self.cache.insert(set);
        }
        self.collect(names)
    }

    fn collect<N: AsRef<str>>(&self, names: &[N]) -> Result<Vec<Arc<FixtureSet>>, FixtureError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.cache
                    .get(name)
                    .ok_or_else(|| FixtureError::definition(name, "record-set was not loaded"))
            })
            .collect()
    }

    /// Forget every cached set. Documents already in the store stay.
    pub fn reset_cache(&mut self) {
        debug!(count = self.cache.len(), "resetting fixture cache");
        self.cache.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.is_loaded(name)
    }

    pub fn cached<N: AsRef<str>>(&self, names: &[N]) -> Vec<Option<Arc<FixtureSet>>> {
        self.cache.cached(names)
    }

    pub fn cache(&self) -> &FixtureCache {
        &self.cache
    }

    /// Every set this loader has ever read, including ones since reset.
    pub fn all_loaded(&self) -> &BTreeMap<String, Arc<FixtureSet>> {
        self.cache.all_loaded()
    }
}

/// Resolve and write every record of `set`, in definition order.
///
/// Sets whose model is unknown to `schema` are skipped. Returns the number of
/// records materialized.
pub fn materialize_set<S, M>(
    store: &mut S,
    schema: &M,
    set: &FixtureSet,
    now: OffsetDateTime,
) -> Result<usize, FixtureError>
where
    S: DocumentStore + ?Sized,
    M: ModelSchema + ?Sized,
{
    if !schema.has_model(set.model()) {
        warn!(
            set = set.name(),
            model = set.model(),
            "model not defined in schema, skipping record-set"
        );
        return Ok(0);
    }

    let resolver = Resolver::new(schema, now);
    let empty = Map::new();
    let mut count = 0;
    for label in set.labels() {
        let raw = set.get(label).unwrap_or(&empty);
        let plan = resolver.resolve(label, raw, set.model())?;
        execute(store, schema, &plan)?;
        count += 1;
    }
    info!(set = set.name(), model = set.model(), records = count, "loaded fixtures");
    Ok(count)
}
