//! Process-wide table of compiled widget schemas.

use super::{DependencyGraph, WidgetSchema};
use crate::error::{CyclicDependencyError, SchemaError, SchemaResult};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// A schema checked for structural validity with its dependency graph built.
#[derive(Debug)]
pub struct CompiledSchema {
    schema: WidgetSchema,
    graph: DependencyGraph,
    cycle_errors: Vec<CyclicDependencyError>,
}

impl CompiledSchema {
    /// Check `schema` and build its dependency graph.
    ///
    /// Cycles do not fail compilation. Each one is logged here, once, and
    /// kept in [`CompiledSchema::cycle_errors`].
    pub fn compile(schema: WidgetSchema) -> SchemaResult<Self> {
        schema.check()?;
        let graph = DependencyGraph::build(schema.derived_map());
        let cycle_errors: Vec<CyclicDependencyError> = graph
            .cycles()
            .iter()
            .map(|members| CyclicDependencyError {
                widget_type: schema.widget_type().to_string(),
                properties: members.clone(),
            })
            .collect();
        for error in &cycle_errors {
            log::warn!("{}", error);
        }
        Ok(Self {
            schema,
            graph,
            cycle_errors,
        })
    }

    pub fn schema(&self) -> &WidgetSchema {
        &self.schema
    }

    pub fn widget_type(&self) -> &str {
        self.schema.widget_type()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cycle_errors(&self) -> &[CyclicDependencyError] {
        &self.cycle_errors
    }

    /// Derived properties to invalidate when `name` changes.
    pub fn affected_by(&self, name: &str) -> IndexSet<String> {
        self.graph.affected_by(name)
    }
}

/// Immutable-once-shared registry of widget schemas, keyed by widget type.
///
/// Registration happens through `&mut self` during start-up; the canvas then
/// holds the registry behind an `Arc`, so no writer exists afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Arc<CompiledSchema>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a schema under its widget type.
    pub fn register(&mut self, schema: WidgetSchema) -> SchemaResult<Arc<CompiledSchema>> {
        let widget_type = schema.widget_type().to_string();
        if self.schemas.contains_key(&widget_type) {
            log::warn!("Rejected duplicate schema for {}", widget_type);
            return Err(SchemaError::DuplicateType(widget_type));
        }
        let compiled = CompiledSchema::compile(schema).inspect_err(|e| {
            log::warn!("Rejected schema for {}: {}", widget_type, e);
        })?;
        let compiled = Arc::new(compiled);
        self.schemas.insert(widget_type.clone(), Arc::clone(&compiled));
        log::debug!("Registered widget type {}", widget_type);
        Ok(compiled)
    }

    /// Look up the compiled schema for `widget_type`.
    pub fn resolve(&self, widget_type: &str) -> SchemaResult<Arc<CompiledSchema>> {
        self.schemas
            .get(widget_type)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(widget_type.to_string()))
    }

    pub fn contains(&self, widget_type: &str) -> bool {
        self.schemas.contains_key(widget_type)
    }

    /// Registered widget types, in registration order.
    pub fn widget_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// A copy of this registry with `schema` replacing the registered schema
    /// of the same type. Used for schema reloads; `self` is left untouched.
    pub fn with_replaced(&self, schema: WidgetSchema) -> SchemaResult<Self> {
        let widget_type = schema.widget_type().to_string();
        if !self.schemas.contains_key(&widget_type) {
            return Err(SchemaError::UnknownType(widget_type));
        }
        let compiled = Arc::new(CompiledSchema::compile(schema)?);
        let mut schemas = self.schemas.clone();
        schemas.insert(widget_type, compiled);
        Ok(Self { schemas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::validation::ValidationRule;
    use serde_json::Value;

    fn schema(widget_type: &str) -> WidgetSchema {
        WidgetSchema::new(widget_type)
            .with_validation("defaultText", ValidationRule::text())
            .with_meta("text", Value::Null)
            .with_default("text", "defaultText")
            .with_derived("value", Expression::reference("text"))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = SchemaRegistry::new();
        registry.register(schema("INPUT")).unwrap();
        let compiled = registry.resolve("INPUT").unwrap();
        assert_eq!(compiled.widget_type(), "INPUT");
        assert_eq!(compiled.graph().order(), ["value".to_string()]);
        assert!(registry.contains("INPUT"));
    }

    #[test]
    fn test_duplicate_type() {
        let mut registry = SchemaRegistry::new();
        registry.register(schema("INPUT")).unwrap();
        assert_eq!(
            registry.register(schema("INPUT")).unwrap_err(),
            SchemaError::DuplicateType("INPUT".to_string())
        );
    }

    #[test]
    fn test_unknown_type() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.resolve("NOPE"),
            Err(SchemaError::UnknownType(_))
        ));
    }

    #[test]
    fn test_invalid_schema_not_registered() {
        let mut registry = SchemaRegistry::new();
        let bad = schema("BAD").with_default("text", "missing");
        assert!(registry.register(bad).is_err());
        assert!(!registry.contains("BAD"));
    }

    #[test]
    fn test_cycle_reported_on_compile() {
        let cyclic = schema("CYCLIC")
            .with_derived("a", Expression::script("{{ this.b }}"))
            .with_derived("b", Expression::script("{{ this.a }}"));
        let compiled = CompiledSchema::compile(cyclic).unwrap();
        assert_eq!(compiled.cycle_errors().len(), 1);
        assert_eq!(compiled.cycle_errors()[0].properties, vec!["a", "b"]);
    }

    #[test]
    fn test_with_replaced_keeps_previous_registry() {
        let mut registry = SchemaRegistry::new();
        registry.register(schema("INPUT")).unwrap();
        let reloaded = registry
            .with_replaced(schema("INPUT").with_derived("upper", Expression::script("{{ this.text }}")))
            .unwrap();
        assert!(!registry.resolve("INPUT").unwrap().schema().is_derived("upper"));
        assert!(reloaded.resolve("INPUT").unwrap().schema().is_derived("upper"));
        assert!(registry.with_replaced(schema("OTHER")).is_err());
    }
}
