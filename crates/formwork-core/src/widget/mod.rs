//! Widget instances and the meta-state store.
//!
//! A [`WidgetInstance`] owns its meta state and derived cache; the
//! [`WidgetManager`] is the single entry point for user-driven edits.

mod instance;
mod manager;

pub use instance::WidgetInstance;
pub use manager::{PropertyChange, UpdateOutcome, WidgetManager};

/// Stable identifier of a widget on the canvas.
pub type WidgetId = uuid::Uuid;
