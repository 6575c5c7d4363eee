//! Built-in widget kinds.
//!
//! A kind is a schema, a render descriptor and a few lifecycle hooks. The
//! canvas calls the hooks and applies the meta edits they return; the hooks
//! themselves never mutate an instance.

mod input;
mod tree_select;

use crate::action::EventBinding;
use crate::error::SchemaResult;
use crate::schema::{SchemaRegistry, WidgetSchema};
use crate::widget::WidgetInstance;
use serde::Serialize;
use serde_json::Value;

/// Register the schema of every built-in kind.
pub fn register_builtins(registry: &mut SchemaRegistry) -> SchemaResult<()> {
    for kind in WidgetKind::ALL {
        registry.register(kind.schema())?;
    }
    log::info!("Registered {} built-in widget kinds", WidgetKind::ALL.len());
    Ok(())
}

/// Presentation metadata handed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderDescriptor {
    pub component: &'static str,
    pub default_rows: u32,
    pub default_columns: u32,
}

/// A meta write requested by a kind, with the binding to fire for user edits.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEdit {
    pub key: String,
    pub value: Value,
    pub binding: Option<EventBinding>,
}

impl MetaEdit {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            binding: None,
        }
    }
}

/// The closed set of widget kinds shipped with the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Input,
    MultiSelectTree,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 2] = [WidgetKind::Input, WidgetKind::MultiSelectTree];

    pub fn widget_type(self) -> &'static str {
        match self {
            Self::Input => input::WIDGET_TYPE,
            Self::MultiSelectTree => tree_select::WIDGET_TYPE,
        }
    }

    pub fn from_type(widget_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.widget_type() == widget_type)
    }

    pub fn schema(self) -> WidgetSchema {
        match self {
            Self::Input => input::schema(),
            Self::MultiSelectTree => tree_select::schema(),
        }
    }

    pub fn render_descriptor(self) -> RenderDescriptor {
        match self {
            Self::Input => input::render_descriptor(),
            Self::MultiSelectTree => tree_select::render_descriptor(),
        }
    }

    /// Runtime writes after the instance is created or its defaults re-seeded.
    pub fn on_mount(self, instance: &WidgetInstance) -> Vec<MetaEdit> {
        match self {
            Self::Input => Vec::new(),
            Self::MultiSelectTree => tree_select::materialize(instance),
        }
    }

    /// Runtime writes after persisted property `name` changed from `previous`.
    pub fn on_property_changed(self, instance: &WidgetInstance, name: &str, previous: Option<&Value>) -> Vec<MetaEdit> {
        match self {
            Self::Input => Vec::new(),
            Self::MultiSelectTree => tree_select::on_property_changed(instance, name, previous),
        }
    }

    /// Runtime writes after a runtime write to meta property `key`.
    pub fn on_meta_written(self, instance: &WidgetInstance, key: &str) -> Vec<MetaEdit> {
        match self {
            Self::Input => Vec::new(),
            Self::MultiSelectTree => tree_select::on_meta_written(instance, key),
        }
    }

    /// The binding a user edit of `key` fires, if the instance configures one.
    pub fn binding_for(self, instance: &WidgetInstance, key: &str) -> Option<EventBinding> {
        match (self, key) {
            (Self::Input, "text") => input::text_binding(instance),
            _ => None,
        }
    }

    /// User edits for picking `values` in a tree select. Empty for other kinds.
    pub fn option_change(self, instance: &WidgetInstance, values: &[Value]) -> Vec<MetaEdit> {
        match self {
            Self::MultiSelectTree => tree_select::option_change(instance, values),
            Self::Input => Vec::new(),
        }
    }
}
