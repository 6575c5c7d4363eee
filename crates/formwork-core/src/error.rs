//! Error taxonomy for the widget runtime.
//!
//! Only schema registration and canvas lookups surface as `Err`. Validation
//! failures are values ([`crate::validation::ValidationResponse`]), expression
//! failures and dependency cycles are contained at a single derived property,
//! and a missed option lookup is simply an empty result.

use crate::widget::WidgetId;
use thiserror::Error;

/// Malformed, duplicate or unknown widget-type schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Widget type already registered: {0}")]
    DuplicateType(String),
    #[error("Unknown widget type: {0}")]
    UnknownType(String),
    #[error("Widget type name must not be empty")]
    EmptyType,
    #[error("{widget_type}: default for `{meta}` reads undeclared property `{property}`")]
    UndeclaredDefaultSource {
        widget_type: String,
        meta: String,
        property: String,
    },
    #[error("{widget_type}: default target `{meta}` is not a meta property")]
    UndeclaredDefaultTarget { widget_type: String, meta: String },
    #[error("{widget_type}: meta property `{name}` collides with a persisted property")]
    MetaCollision { widget_type: String, name: String },
    #[error("{widget_type}: derived property `{name}` collides with a declared property")]
    DerivedCollision { widget_type: String, name: String },
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A derived-property dependency cycle found while compiling a schema.
///
/// Never returned to callers; it is logged once and kept on the compiled
/// schema so tooling can surface it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{widget_type}: cyclic derived properties {properties:?}")]
pub struct CyclicDependencyError {
    pub widget_type: String,
    pub properties: Vec<String>,
}

/// Failure inside expression evaluation for a single derived property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Expression cannot be evaluated by this evaluator: {0}")]
    Unsupported(String),
    #[error("Expression failed: {0}")]
    Failed(String),
    #[error("`{property}` is not a {expected}")]
    TypeMismatch { property: String, expected: String },
}

/// Errors surfaced by the canvas aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Widget not found: {0}")]
    UnknownWidget(WidgetId),
    #[error("Widget already on the canvas: {0}")]
    DuplicateWidget(WidgetId),
    #[error("{widget_type} has no meta property `{key}`")]
    UnknownMetaProperty { widget_type: String, key: String },
}

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;
