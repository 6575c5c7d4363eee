//! Headless editor shell.
//!
//! Owns a [`Canvas`], replays scenario steps against it and applies the
//! commands the selection state machine emits.

use crate::AppResult;
use crate::scenario::{Scenario, Step};
use formwork_core::{Canvas, EngineConfig, EventPayload, ShellCommand, WidgetId};
use indexmap::IndexMap;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the shell shows around the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellState {
    /// The shell's view of the selected widgets.
    pub selected: Vec<WidgetId>,
    /// A drag-selection is in progress.
    pub canvas_selecting: bool,
    pub selection_origin: Option<Point>,
    pub property_pane_open: bool,
    pub filter_pane_open: bool,
}

/// Resolved state of one widget after replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetReport {
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub widget_type: String,
    pub name: String,
    pub is_dirty: bool,
    pub meta: IndexMap<String, Value>,
    /// Derived values. `null` stands for undefined.
    pub derived: IndexMap<String, Option<Value>>,
}

/// Output of a replayed scenario.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub shell: ShellState,
    pub widgets: Vec<WidgetReport>,
    /// Event payloads handed to the action runtime, in dispatch order.
    pub payloads: Vec<EventPayload>,
}

pub struct Shell {
    canvas: Canvas,
    state: ShellState,
    payloads: Vec<EventPayload>,
}

impl Shell {
    pub fn new(config: EngineConfig) -> AppResult<Self> {
        Ok(Self {
            canvas: Canvas::new(config)?,
            state: ShellState::default(),
            payloads: Vec::new(),
        })
    }

    /// Build a shell with the scenario's config, shell state and widgets.
    pub fn from_scenario(scenario: &Scenario) -> AppResult<Self> {
        let mut shell = Self::new(scenario.config.clone())?;
        shell.state = scenario.shell.clone();
        for widget in &scenario.widgets {
            shell.canvas.add_widget(widget.clone())?;
        }
        Ok(shell)
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn payloads(&self) -> &[EventPayload] {
        &self.payloads
    }

    /// Run one logical turn.
    pub fn run_turn(&mut self, steps: &[Step]) -> AppResult<()> {
        self.canvas.begin_turn();
        for step in steps {
            self.apply(step)?;
        }
        self.payloads.extend(self.canvas.dispatcher_mut().drain());
        Ok(())
    }

    /// Apply a single step inside the current turn.
    pub fn apply(&mut self, step: &Step) -> AppResult<()> {
        match step {
            Step::SetProperty { widget, name, value } => {
                self.canvas.set_property(*widget, name, value.clone())?;
            }
            Step::UpdateMeta {
                widget,
                key,
                value,
                binding,
            } => {
                self.canvas.update_meta(*widget, key, value.clone(), binding.as_ref())?;
            }
            Step::ChangeText { widget, text } => {
                self.canvas.change_text(*widget, text)?;
            }
            Step::SetFocus { widget, focused } => {
                self.canvas.set_focus(*widget, *focused)?;
            }
            Step::ChangeOptions { widget, values } => {
                self.canvas.change_options(*widget, values.clone())?;
            }
            Step::Pointer { event, capabilities } => {
                let commands = self.canvas.handle_pointer(event, *capabilities);
                for command in commands {
                    self.apply_command(command)?;
                }
            }
        }
        Ok(())
    }

    fn apply_command(&mut self, command: ShellCommand) -> AppResult<()> {
        log::debug!("Shell command: {:?}", command);
        match command {
            ShellCommand::SetCanvasSelecting { active, origin } => {
                self.state.canvas_selecting = active;
                self.state.selection_origin = origin;
            }
            ShellCommand::ClearFocus => self.canvas.clear_focus()?,
            ShellCommand::DeselectAll => self.state.selected.clear(),
            ShellCommand::ClosePropertyPane => self.state.property_pane_open = false,
            ShellCommand::CloseFilterPane => self.state.filter_pane_open = false,
            ShellCommand::SelectionChanged { ids } => self.state.selected = ids,
        }
        Ok(())
    }

    /// Resolve every widget and collect the outcome.
    pub fn report(&mut self) -> AppResult<Report> {
        let ids: Vec<WidgetId> = self.canvas.widgets.ids().collect();
        let mut widgets = Vec::with_capacity(ids.len());
        for id in ids {
            let derived = self.canvas.derived_values(id)?;
            let name = self
                .canvas
                .document
                .get(id)
                .map(|config| config.name.clone())
                .unwrap_or_default();
            let Some(instance) = self.canvas.widgets.get(id) else {
                continue;
            };
            widgets.push(WidgetReport {
                id,
                widget_type: instance.widget_type().to_string(),
                name,
                is_dirty: instance.is_dirty(),
                meta: instance.meta().clone(),
                derived,
            });
        }
        Ok(Report {
            shell: self.state.clone(),
            widgets,
            payloads: self.payloads.clone(),
        })
    }
}

/// Replay every turn of `scenario` and report the final state.
pub fn run_scenario(scenario: &Scenario) -> AppResult<Report> {
    let mut shell = Shell::from_scenario(scenario)?;
    for (index, turn) in scenario.turns.iter().enumerate() {
        log::debug!("Turn {} ({} step(s))", index, turn.len());
        shell.run_turn(turn)?;
    }
    shell.report()
}
