//! One live widget: persisted properties, meta state and derived cache.

use super::WidgetId;
use crate::derived::{DerivedCache, Snapshot};
use crate::expression::ExpressionEvaluator;
use crate::schema::CompiledSchema;
use crate::validation::{ValidationResponse, validate, validate_properties};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

const DIRTY_KEY: &str = "isDirty";

/// Runtime state of a single widget.
///
/// Persisted properties are stored both raw and parsed; expressions read the
/// parsed form. Every mutation invalidates exactly the derived properties
/// that depend on what changed.
#[derive(Debug, Clone)]
pub struct WidgetInstance {
    id: WidgetId,
    schema: Arc<CompiledSchema>,
    raw: IndexMap<String, Value>,
    properties: IndexMap<String, Value>,
    validation: IndexMap<String, ValidationResponse>,
    meta: IndexMap<String, Value>,
    is_dirty: bool,
    derived: DerivedCache,
}

impl WidgetInstance {
    /// Validate `raw` and seed meta state from the schema.
    pub fn new(id: WidgetId, schema: Arc<CompiledSchema>, raw: IndexMap<String, Value>) -> Self {
        let derived = DerivedCache::new(&schema);
        let mut instance = Self {
            id,
            schema,
            raw,
            properties: IndexMap::new(),
            validation: IndexMap::new(),
            meta: IndexMap::new(),
            is_dirty: false,
            derived,
        };
        instance.revalidate();
        instance.seed_meta();
        instance
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn widget_type(&self) -> &str {
        self.schema.widget_type()
    }

    pub fn schema(&self) -> &Arc<CompiledSchema> {
        &self.schema
    }

    /// Parsed persisted properties.
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Persisted properties as supplied, before validation.
    pub fn raw_properties(&self) -> &IndexMap<String, Value> {
        &self.raw
    }

    pub fn validation(&self) -> &IndexMap<String, ValidationResponse> {
        &self.validation
    }

    /// Whether `name` validated cleanly. Properties without a rule count as valid.
    pub fn is_property_valid(&self, name: &str) -> bool {
        self.validation.get(name).is_none_or(|response| response.is_valid)
    }

    pub fn meta(&self) -> &IndexMap<String, Value> {
        &self.meta
    }

    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Store a raw persisted value. Returns whether its parsed form changed.
    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        self.raw.insert(name.to_string(), value.clone());
        let parsed = match self.schema.schema().validation_map().get(name) {
            Some(rule) => {
                let response = validate(&value, rule);
                let parsed = response.parsed.clone();
                self.validation.insert(name.to_string(), response);
                parsed
            }
            None => value,
        };
        if self.properties.get(name) == Some(&parsed) {
            return false;
        }
        self.properties.insert(name.to_string(), parsed);
        self.invalidate(name);
        true
    }

    /// Store a meta value. Returns whether it changed.
    pub fn set_meta(&mut self, key: &str, value: Value) -> bool {
        if self.meta.get(key) == Some(&value) {
            return false;
        }
        self.meta.insert(key.to_string(), value);
        self.invalidate(key);
        true
    }

    /// Returns whether the flag changed.
    pub fn set_dirty(&mut self, dirty: bool) -> bool {
        if self.is_dirty == dirty {
            return false;
        }
        self.is_dirty = dirty;
        self.invalidate(DIRTY_KEY);
        true
    }

    /// Re-seed every meta property fed by `source` from its parsed value.
    /// Returns the meta keys that changed.
    pub fn reseed_from(&mut self, source: &str) -> Vec<String> {
        let seeded = self.parsed_default(source);
        let targets: Vec<String> = self
            .schema
            .schema()
            .default_targets(source)
            .map(str::to_string)
            .collect();
        let mut changed = Vec::new();
        for meta in targets {
            let value = seeded
                .clone()
                .or_else(|| self.schema.schema().meta_map().get(&meta).cloned())
                .unwrap_or(Value::Null);
            if self.set_meta(&meta, value) {
                changed.push(meta);
            }
        }
        changed
    }

    /// Current value of any property on this instance, computing derived
    /// properties as needed. `None` is `undefined`.
    pub fn resolve(&mut self, name: &str, evaluator: &dyn ExpressionEvaluator) -> Option<Value> {
        let snapshot = Snapshot {
            properties: &self.properties,
            meta: &self.meta,
            is_dirty: self.is_dirty,
        };
        self.derived.resolve(&self.schema, &snapshot, evaluator, name)
    }

    /// Bring every derived property up to date.
    pub fn refresh(&mut self, evaluator: &dyn ExpressionEvaluator) {
        let snapshot = Snapshot {
            properties: &self.properties,
            meta: &self.meta,
            is_dirty: self.is_dirty,
        };
        self.derived.refresh(&self.schema, &snapshot, evaluator);
    }

    /// Refresh, then report every derived value.
    pub fn derived_values(&mut self, evaluator: &dyn ExpressionEvaluator) -> IndexMap<String, Option<Value>> {
        self.refresh(evaluator);
        self.derived.values()
    }

    /// Whether the derived property `name` awaits recompute.
    pub fn is_stale(&self, name: &str) -> Option<bool> {
        self.derived.is_stale(name)
    }

    /// Swap in a reloaded schema for the same widget type.
    pub fn rebind(&mut self, schema: Arc<CompiledSchema>) {
        self.schema = schema;
        self.revalidate();
        for (key, initial) in self.schema.schema().meta_map() {
            if !self.meta.contains_key(key) {
                self.meta.insert(key.clone(), initial.clone());
            }
        }
        self.derived.rebuild(&self.schema);
    }

    fn revalidate(&mut self) {
        let rules = self.schema.schema().validation_map();
        self.validation = validate_properties(rules, &self.raw);
        let mut properties: IndexMap<String, Value> = self
            .raw
            .iter()
            .filter(|(name, _)| !rules.contains_key(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for (name, response) in &self.validation {
            properties.insert(name.clone(), response.parsed.clone());
        }
        self.properties = properties;
    }

    fn seed_meta(&mut self) {
        let schema = Arc::clone(&self.schema);
        for (key, initial) in schema.schema().meta_map() {
            let value = schema
                .schema()
                .defaults_map()
                .get(key)
                .and_then(|source| self.parsed_default(source))
                .unwrap_or_else(|| initial.clone());
            self.meta.insert(key.clone(), value);
        }
    }

    fn parsed_default(&self, source: &str) -> Option<Value> {
        self.properties
            .get(source)
            .filter(|value| !value.is_null())
            .cloned()
    }

    fn invalidate(&mut self, name: &str) {
        let affected = self.schema.affected_by(name);
        if !affected.is_empty() {
            self.derived.invalidate(&affected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, NativeEvaluator};
    use crate::schema::WidgetSchema;
    use crate::validation::ValidationRule;
    use serde_json::json;
    use uuid::Uuid;

    fn compiled() -> Arc<CompiledSchema> {
        let schema = WidgetSchema::new("ECHO")
            .with_validation("defaultText", ValidationRule::text())
            .with_validation("maxChars", ValidationRule::number())
            .with_meta("text", Value::Null)
            .with_default("text", "defaultText")
            .with_derived("value", Expression::reference("text"))
            .with_derived("dirty", Expression::reference("isDirty"));
        Arc::new(CompiledSchema::compile(schema).unwrap())
    }

    fn raw(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_seeds_meta_from_default() {
        let mut instance = WidgetInstance::new(Uuid::new_v4(), compiled(), raw(&[("defaultText", json!("hi"))]));
        assert_eq!(instance.meta_value("text"), Some(&json!("hi")));
        assert_eq!(instance.resolve("value", &NativeEvaluator), Some(json!("hi")));
        assert!(!instance.is_dirty());
    }

    #[test]
    fn test_parsed_properties() {
        let instance = WidgetInstance::new(
            Uuid::new_v4(),
            compiled(),
            raw(&[("maxChars", json!("12")), ("onTextChanged", json!("{{ run() }}"))]),
        );
        assert_eq!(instance.property("maxChars"), Some(&json!(12)));
        assert_eq!(instance.property("onTextChanged"), Some(&json!("{{ run() }}")));
        assert!(instance.is_property_valid("maxChars"));
    }

    #[test]
    fn test_set_meta_invalidates_dependents_only() {
        let mut instance = WidgetInstance::new(Uuid::new_v4(), compiled(), IndexMap::new());
        instance.refresh(&NativeEvaluator);
        assert!(instance.set_meta("text", json!("typed")));
        assert_eq!(instance.is_stale("value"), Some(true));
        assert_eq!(instance.is_stale("dirty"), Some(false));
        assert!(!instance.set_meta("text", json!("typed")));
        assert_eq!(instance.resolve("value", &NativeEvaluator), Some(json!("typed")));
    }

    #[test]
    fn test_set_dirty_invalidates_dirty_readers() {
        let mut instance = WidgetInstance::new(Uuid::new_v4(), compiled(), IndexMap::new());
        assert_eq!(instance.resolve("dirty", &NativeEvaluator), Some(json!(false)));
        assert!(instance.set_dirty(true));
        assert!(!instance.set_dirty(true));
        assert_eq!(instance.resolve("dirty", &NativeEvaluator), Some(json!(true)));
    }

    #[test]
    fn test_reseed_from_source() {
        let mut instance = WidgetInstance::new(Uuid::new_v4(), compiled(), raw(&[("defaultText", json!("a"))]));
        instance.set_meta("text", json!("user"));
        assert!(instance.set_property("defaultText", json!("b")));
        assert_eq!(instance.reseed_from("defaultText"), vec!["text".to_string()]);
        assert_eq!(instance.meta_value("text"), Some(&json!("b")));
    }
}
