//! Widget schemas: the declarative description of one widget type.
//!
//! A schema names the persisted properties (through their validation rules
//! and trigger bindings), the transient meta properties with their initial
//! values, which persisted property seeds which meta property, and the
//! derived properties computed from all of the above.

mod graph;
mod registry;

pub use graph::DependencyGraph;
pub use registry::{CompiledSchema, SchemaRegistry};

use crate::error::{SchemaError, SchemaResult};
use crate::expression::Expression;
use crate::validation::ValidationRule;
use indexmap::IndexMap;
use serde_json::Value;

/// Declarative schema for one widget type.
#[derive(Debug, Clone)]
pub struct WidgetSchema {
    widget_type: String,
    validation: IndexMap<String, ValidationRule>,
    derived: IndexMap<String, Expression>,
    /// Meta property name -> persisted property supplying its initial value.
    defaults: IndexMap<String, String>,
    /// Meta property name -> initial value (`Null` is `undefined`).
    meta: IndexMap<String, Value>,
    /// Persisted properties holding event bindings.
    triggers: Vec<String>,
}

impl WidgetSchema {
    /// Start an empty schema for `widget_type`.
    pub fn new(widget_type: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            validation: IndexMap::new(),
            derived: IndexMap::new(),
            defaults: IndexMap::new(),
            meta: IndexMap::new(),
            triggers: Vec::new(),
        }
    }

    /// Declare a persisted property and its rule.
    pub fn with_validation(mut self, name: impl Into<String>, rule: ValidationRule) -> Self {
        self.validation.insert(name.into(), rule);
        self
    }

    /// Declare a derived property.
    pub fn with_derived(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.derived.insert(name.into(), expression);
        self
    }

    /// Seed meta property `meta` from persisted property `source`.
    pub fn with_default(mut self, meta: impl Into<String>, source: impl Into<String>) -> Self {
        self.defaults.insert(meta.into(), source.into());
        self
    }

    /// Declare a meta property and its initial value.
    pub fn with_meta(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.meta.insert(name.into(), initial);
        self
    }

    /// Declare a persisted trigger property (an event binding).
    pub fn with_trigger(mut self, name: impl Into<String>) -> Self {
        self.triggers.push(name.into());
        self
    }

    pub fn widget_type(&self) -> &str {
        &self.widget_type
    }

    pub fn validation_map(&self) -> &IndexMap<String, ValidationRule> {
        &self.validation
    }

    pub fn derived_map(&self) -> &IndexMap<String, Expression> {
        &self.derived
    }

    pub fn defaults_map(&self) -> &IndexMap<String, String> {
        &self.defaults
    }

    pub fn meta_map(&self) -> &IndexMap<String, Value> {
        &self.meta
    }

    /// Whether `name` is a persisted (configuration) property.
    pub fn is_persisted(&self, name: &str) -> bool {
        self.validation.contains_key(name) || self.triggers.iter().any(|t| t == name)
    }

    pub fn is_meta(&self, name: &str) -> bool {
        self.meta.contains_key(name)
    }

    pub fn is_derived(&self, name: &str) -> bool {
        self.derived.contains_key(name)
    }

    /// Meta properties seeded from `source`.
    pub fn default_targets<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.defaults
            .iter()
            .filter(move |(_, s)| s.as_str() == source)
            .map(|(meta, _)| meta.as_str())
    }

    /// Structural checks performed at registration.
    fn check(&self) -> SchemaResult<()> {
        if self.widget_type.trim().is_empty() {
            return Err(SchemaError::EmptyType);
        }
        for name in self.meta.keys() {
            if self.is_persisted(name) {
                return Err(SchemaError::MetaCollision {
                    widget_type: self.widget_type.clone(),
                    name: name.clone(),
                });
            }
        }
        for name in self.derived.keys() {
            if self.is_persisted(name) || self.is_meta(name) {
                return Err(SchemaError::DerivedCollision {
                    widget_type: self.widget_type.clone(),
                    name: name.clone(),
                });
            }
        }
        for (meta, source) in &self.defaults {
            if !self.is_meta(meta) {
                return Err(SchemaError::UndeclaredDefaultTarget {
                    widget_type: self.widget_type.clone(),
                    meta: meta.clone(),
                });
            }
            if !self.is_persisted(source) {
                return Err(SchemaError::UndeclaredDefaultSource {
                    widget_type: self.widget_type.clone(),
                    meta: meta.clone(),
                    property: source.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> WidgetSchema {
        WidgetSchema::new("TEST_WIDGET")
            .with_validation("defaultText", ValidationRule::text())
            .with_meta("text", Value::Null)
            .with_default("text", "defaultText")
            .with_derived("value", Expression::reference("text"))
    }

    #[test]
    fn test_valid_schema() {
        let schema = base();
        assert!(schema.check().is_ok());
        assert_eq!(schema.default_targets("defaultText").collect::<Vec<_>>(), vec!["text"]);
    }

    #[test]
    fn test_empty_type() {
        assert_eq!(WidgetSchema::new("  ").check(), Err(SchemaError::EmptyType));
    }

    #[test]
    fn test_undeclared_default_source() {
        let schema = base().with_meta("other", json!(0)).with_default("other", "missing");
        assert!(matches!(
            schema.check(),
            Err(SchemaError::UndeclaredDefaultSource { .. })
        ));
    }

    #[test]
    fn test_undeclared_default_target() {
        let schema = base().with_default("nope", "defaultText");
        assert!(matches!(
            schema.check(),
            Err(SchemaError::UndeclaredDefaultTarget { .. })
        ));
    }

    #[test]
    fn test_meta_collision() {
        let schema = base().with_meta("defaultText", Value::Null);
        assert!(matches!(schema.check(), Err(SchemaError::MetaCollision { .. })));
    }

    #[test]
    fn test_derived_collision() {
        let schema = base().with_derived("text", Expression::reference("defaultText"));
        assert!(matches!(schema.check(), Err(SchemaError::DerivedCollision { .. })));
    }
}
