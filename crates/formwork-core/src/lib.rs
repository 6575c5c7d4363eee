//! Formwork Core Library
//!
//! Widget runtime for the Formwork app builder: schemas, validation,
//! derived-property evaluation, meta state, option trees and canvas
//! drag-selection.

pub mod action;
pub mod canvas;
pub mod config;
pub mod derived;
pub mod error;
pub mod expression;
pub mod input;
pub mod kinds;
pub mod options;
pub mod schema;
pub mod selection;
pub mod validation;
pub mod widget;

pub use action::{ActionDispatcher, ActionQueue, EventBinding, EventPayload, EventType};
pub use canvas::{Canvas, CanvasDocument, WidgetConfig};
pub use config::{EngineConfig, HitMode, SelectionConfig};
pub use error::{CanvasError, CanvasResult, CyclicDependencyError, EvalError, SchemaError, SchemaResult};
pub use expression::{Expression, ExpressionEvaluator, NativeEvaluator, Scope};
pub use input::{CanvasEvent, Capabilities};
pub use kinds::{WidgetKind, register_builtins};
pub use options::{CheckedStrategy, OptionNode, find_subtree, resolve_selection};
pub use schema::{CompiledSchema, SchemaRegistry, WidgetSchema};
pub use selection::{SelectionState, ShellCommand};
pub use validation::{ValidationResponse, ValidationRule, validate};
pub use widget::{UpdateOutcome, WidgetId, WidgetInstance, WidgetManager};
