//! Scenario files: a canvas layout plus scripted user turns.

use crate::shell::ShellState;
use formwork_core::{Capabilities, CanvasEvent, EngineConfig, EventBinding, WidgetConfig, WidgetId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A replayable editing session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub config: EngineConfig,
    /// Initial shell state (open panes, selection).
    pub shell: ShellState,
    /// Widgets placed on the canvas, in insertion order. Parents first.
    pub widgets: Vec<WidgetConfig>,
    /// Each turn is one logical user interaction.
    pub turns: Vec<Vec<Step>>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: impl AsRef<Path>) -> crate::AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let scenario = Self::from_json(&content)?;
        log::info!(
            "Loaded scenario {:?}: {} widget(s), {} turn(s)",
            path.as_ref(),
            scenario.widgets.len(),
            scenario.turns.len()
        );
        Ok(scenario)
    }
}

/// One scripted action inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Property-pane edit of a persisted property.
    SetProperty { widget: WidgetId, name: String, value: Value },
    /// Raw user edit of a meta property.
    UpdateMeta {
        widget: WidgetId,
        key: String,
        value: Value,
        #[serde(default)]
        binding: Option<EventBinding>,
    },
    /// Typing into an input widget. Fires the widget's own text binding.
    ChangeText { widget: WidgetId, text: String },
    SetFocus {
        widget: WidgetId,
        #[serde(default = "focused_default")]
        focused: bool,
    },
    /// Picking values in a tree select.
    ChangeOptions { widget: WidgetId, values: Vec<Value> },
    Pointer {
        event: CanvasEvent,
        #[serde(default)]
        capabilities: Capabilities,
    },
}

fn focused_default() -> bool {
    true
}
