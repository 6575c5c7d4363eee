//! Derived-property evaluation for a single widget instance.
//!
//! Values are computed lazily: `resolve` recomputes a stale property after
//! first bringing its stale derived dependencies up to date, in dependency
//! order. An entry is always either fresh or stale; a property is never left
//! half computed. Properties on a dependency cycle are never recomputed and
//! keep their last good value (`None` before any exists). A failed
//! evaluation keeps the property's last good value and does not affect its
//! siblings.

use crate::expression::{ExpressionEvaluator, Scope};
use crate::schema::CompiledSchema;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// The persisted and meta state a derived property is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub properties: &'a IndexMap<String, Value>,
    pub meta: &'a IndexMap<String, Value>,
    pub is_dirty: bool,
}

impl Snapshot<'_> {
    /// Look up a non-derived property: meta, then the dirty flag, then persisted.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let derived = IndexMap::new();
        let dirty = Value::Bool(self.is_dirty);
        Scope::new(self.properties, self.meta, &derived, &dirty)
            .get(name)
            .cloned()
    }
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    value: Option<Value>,
    last_good: Option<Value>,
    stale: bool,
}

/// Cached derived values of one instance.
#[derive(Debug, Clone, Default)]
pub struct DerivedCache {
    entries: IndexMap<String, CacheEntry>,
    in_progress: HashSet<String>,
}

impl DerivedCache {
    /// A cache with every derived property of `compiled` stale and undefined.
    pub fn new(compiled: &CompiledSchema) -> Self {
        let entries = compiled
            .schema()
            .derived_map()
            .keys()
            .map(|name| {
                (
                    name.clone(),
                    CacheEntry {
                        stale: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            entries,
            in_progress: HashSet::new(),
        }
    }

    /// Current value of `name`, recomputing it if stale.
    ///
    /// Non-derived names read straight from the snapshot.
    pub fn resolve(
        &mut self,
        compiled: &CompiledSchema,
        snapshot: &Snapshot<'_>,
        evaluator: &dyn ExpressionEvaluator,
        name: &str,
    ) -> Option<Value> {
        if !compiled.schema().is_derived(name) {
            return snapshot.lookup(name);
        }
        self.ensure(compiled, snapshot, evaluator, name);
        self.entries.get(name).and_then(|entry| entry.value.clone())
    }

    /// Bring every stale derived property up to date, in dependency order.
    pub fn refresh(
        &mut self,
        compiled: &CompiledSchema,
        snapshot: &Snapshot<'_>,
        evaluator: &dyn ExpressionEvaluator,
    ) {
        for name in compiled.graph().order() {
            self.ensure(compiled, snapshot, evaluator, name);
        }
    }

    fn ensure(
        &mut self,
        compiled: &CompiledSchema,
        snapshot: &Snapshot<'_>,
        evaluator: &dyn ExpressionEvaluator,
        name: &str,
    ) {
        if compiled.graph().is_cyclic(name) {
            return;
        }
        if !self.entries.get(name).is_some_and(|entry| entry.stale) {
            return;
        }
        let Some(expression) = compiled.schema().derived_map().get(name) else {
            return;
        };
        if !self.in_progress.insert(name.to_string()) {
            log::debug!("Skipping re-entrant recompute of {}", name);
            return;
        }

        let schema = compiled.schema();
        for dep in expression.dependencies() {
            if schema.is_derived(dep) {
                self.ensure(compiled, snapshot, evaluator, dep);
            }
        }
        let derived: IndexMap<String, Option<Value>> = expression
            .dependencies()
            .iter()
            .filter(|dep| schema.is_derived(dep))
            .map(|dep| {
                let value = self.entries.get(dep).and_then(|entry| entry.value.clone());
                (dep.clone(), value)
            })
            .collect();
        let dirty = Value::Bool(snapshot.is_dirty);
        let scope = Scope::new(snapshot.properties, snapshot.meta, &derived, &dirty);
        let outcome = evaluator.evaluate(expression, &scope);

        let entry = self.entries.entry(name.to_string()).or_default();
        match outcome {
            Ok(value) => {
                entry.last_good = value.clone();
                entry.value = value;
            }
            Err(e) => {
                log::warn!("{}.{} failed to evaluate: {}", compiled.widget_type(), name, e);
                entry.value = entry.last_good.clone();
            }
        }
        entry.stale = false;
        self.in_progress.remove(name);
    }

    /// Mark `names` stale. Returns how many were fresh before.
    pub fn invalidate<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for name in names {
            if let Some(entry) = self.entries.get_mut(name.as_ref()) {
                if !entry.stale {
                    count += 1;
                }
                entry.stale = true;
            }
        }
        count
    }

    /// Adopt a reloaded schema: entries for surviving properties keep their
    /// values as last good, new properties start undefined, all are stale.
    pub fn rebuild(&mut self, compiled: &CompiledSchema) {
        let mut entries = IndexMap::new();
        for name in compiled.schema().derived_map().keys() {
            let mut entry = self.entries.shift_remove(name).unwrap_or_default();
            entry.stale = true;
            entries.insert(name.clone(), entry);
        }
        self.entries = entries;
    }

    /// Whether `name` is a cached derived property awaiting recompute.
    pub fn is_stale(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|entry| entry.stale)
    }

    /// Every cached value, stale or not.
    pub fn values(&self) -> IndexMap<String, Option<Value>> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }
}
