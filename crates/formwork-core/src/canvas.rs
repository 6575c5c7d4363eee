//! Canvas document and runtime state.

use crate::action::{ActionDispatcher, ActionQueue, EventBinding};
use crate::config::{EngineConfig, HitMode};
use crate::error::{CanvasError, CanvasResult};
use crate::expression::{ExpressionEvaluator, NativeEvaluator};
use crate::input::{CanvasEvent, Capabilities};
use crate::kinds::{MetaEdit, WidgetKind, register_builtins};
use crate::schema::SchemaRegistry;
use crate::selection::{HitTest, SelectionState, ShellCommand, hits, transition};
use crate::widget::{PropertyChange, UpdateOutcome, WidgetId, WidgetInstance, WidgetManager};
use indexmap::IndexMap;
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Upper bound on chained hook passes after a runtime write.
const MAX_HOOK_PASSES: usize = 4;

/// Layout and persisted configuration of one widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "Uuid::new_v4")]
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub name: String,
    /// Bounding box in canvas coordinates.
    pub bounds: Rect,
    #[serde(default)]
    pub parent: Option<WidgetId>,
    #[serde(default)]
    pub children: Vec<WidgetId>,
    /// Raw persisted properties.
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
}

impl WidgetConfig {
    pub fn new(widget_type: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: Uuid::new_v4(),
            widget_type: widget_type.into(),
            name: String::new(),
            bounds,
            parent: None,
            children: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// A canvas document containing all widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasDocument {
    /// Unique document identifier.
    pub id: String,
    /// Document name.
    pub name: String,
    /// All widgets in the document, keyed by ID.
    pub widgets: IndexMap<WidgetId, WidgetConfig>,
    /// Z-order of widgets (back to front).
    pub z_order: Vec<WidgetId>,
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            widgets: IndexMap::new(),
            z_order: Vec::new(),
        }
    }

    /// Add a widget on top of the z-order, linking it under its parent.
    /// Returns `false` and leaves the document unchanged if the id is taken.
    pub fn add_widget(&mut self, config: WidgetConfig) -> bool {
        let id = config.id;
        if self.widgets.contains_key(&id) {
            return false;
        }
        if let Some(parent) = config.parent.and_then(|p| self.widgets.get_mut(&p)) {
            if !parent.children.contains(&id) {
                parent.children.push(id);
            }
        }
        self.z_order.push(id);
        self.widgets.insert(id, config);
        true
    }

    /// Remove a widget and its descendants. Returns the removed IDs, parent first.
    pub fn remove_widget(&mut self, id: WidgetId) -> Vec<WidgetId> {
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(config) = self.widgets.shift_remove(&current) {
                stack.extend(config.children.iter().rev().copied());
                removed.push(current);
            }
        }
        for widget in self.widgets.values_mut() {
            widget.children.retain(|child| !removed.contains(child));
        }
        self.z_order.retain(|widget_id| !removed.contains(widget_id));
        removed
    }

    /// Get a widget by ID.
    pub fn get(&self, id: WidgetId) -> Option<&WidgetConfig> {
        self.widgets.get(&id)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut WidgetConfig> {
        self.widgets.get_mut(&id)
    }

    /// Direct children of `id`, in order.
    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.widgets.get(&id).map_or(&[], |config| config.children.as_slice())
    }

    /// Get widgets in z-order (back to front).
    pub fn widgets_ordered(&self) -> impl Iterator<Item = &WidgetConfig> {
        self.z_order.iter().filter_map(|id| self.widgets.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Serialize the document to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a document from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl HitTest for CanvasDocument {
    fn widgets_in_rect(&self, rect: Rect, mode: HitMode) -> Vec<WidgetId> {
        self.widgets_ordered()
            .filter(|config| hits(rect, config.bounds, mode))
            .map(|config| config.id)
            .collect()
    }
}

/// Runtime canvas: the document plus every widget's live state.
pub struct Canvas<D: ActionDispatcher = ActionQueue> {
    /// The document being edited.
    pub document: CanvasDocument,
    /// Meta-state store.
    pub widgets: WidgetManager,
    selection: SelectionState,
    registry: Arc<SchemaRegistry>,
    evaluator: Box<dyn ExpressionEvaluator>,
    dispatcher: D,
    config: EngineConfig,
}

impl Canvas {
    /// Create an empty canvas, registering the built-in kinds when configured.
    pub fn new(config: EngineConfig) -> CanvasResult<Self> {
        let mut registry = SchemaRegistry::new();
        if config.register_builtin_kinds {
            register_builtins(&mut registry)?;
        }
        Ok(Self::with_registry(Arc::new(registry), config))
    }

    /// Create an empty canvas over an existing registry.
    pub fn with_registry(registry: Arc<SchemaRegistry>, config: EngineConfig) -> Self {
        Self {
            document: CanvasDocument::new(),
            widgets: WidgetManager::new(),
            selection: SelectionState::new(),
            registry,
            evaluator: Box::new(NativeEvaluator),
            dispatcher: ActionQueue::new(),
            config,
        }
    }
}

impl<D: ActionDispatcher> Canvas<D> {
    /// Replace the expression evaluator.
    pub fn with_evaluator(mut self, evaluator: Box<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replace the action dispatcher.
    pub fn with_dispatcher<E: ActionDispatcher>(self, dispatcher: E) -> Canvas<E> {
        Canvas {
            document: self.document,
            widgets: self.widgets,
            selection: self.selection,
            registry: self.registry,
            evaluator: self.evaluator,
            dispatcher,
            config: self.config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Start a new logical turn.
    pub fn begin_turn(&mut self) {
        self.widgets.begin_turn();
    }

    fn instance(&self, id: WidgetId) -> CanvasResult<&WidgetInstance> {
        self.widgets.get(id).ok_or(CanvasError::UnknownWidget(id))
    }

    fn kind_of(&self, id: WidgetId) -> Option<WidgetKind> {
        self.widgets
            .get(id)
            .and_then(|instance| WidgetKind::from_type(instance.widget_type()))
    }

    /// Place a widget on the canvas and mount it.
    pub fn add_widget(&mut self, config: WidgetConfig) -> CanvasResult<WidgetId> {
        let id = config.id;
        if self.widgets.contains(id) || self.document.get(id).is_some() {
            return Err(CanvasError::DuplicateWidget(id));
        }
        let schema = self.registry.resolve(&config.widget_type)?;
        self.widgets.initialize(id, schema, config.properties.clone());
        self.document.add_widget(config);
        if let Some(kind) = self.kind_of(id) {
            let edits = kind.on_mount(self.instance(id)?);
            self.apply_runtime_edits(id, edits)?;
        }
        Ok(id)
    }

    /// Remove a widget and its descendants.
    pub fn remove_widget(&mut self, id: WidgetId) -> CanvasResult<Vec<WidgetId>> {
        if !self.widgets.contains(id) {
            return Err(CanvasError::UnknownWidget(id));
        }
        let removed = self.document.remove_widget(id);
        for widget in &removed {
            self.widgets.remove(*widget);
        }
        self.selection.selected.retain(|selected| !removed.contains(selected));
        Ok(removed)
    }

    /// Edit a persisted property and run the kind's reaction to it.
    pub fn set_property(&mut self, id: WidgetId, name: &str, value: Value) -> CanvasResult<PropertyChange> {
        let previous = self.instance(id)?.property(name).cloned();
        let change = self.widgets.set_property(id, name, value.clone())?;
        if let Some(config) = self.document.get_mut(id) {
            config.properties.insert(name.to_string(), value);
        }
        if let Some(kind) = self.kind_of(id) {
            let instance = self.instance(id)?;
            let edits = if change.default_changed {
                kind.on_mount(instance)
            } else if change.changed {
                kind.on_property_changed(instance, name, previous.as_ref())
            } else {
                Vec::new()
            };
            self.apply_runtime_edits(id, edits)?;
        }
        Ok(change)
    }

    /// A user edit of a meta property. A payload built from `binding` is
    /// handed to the dispatcher.
    pub fn update_meta(
        &mut self,
        id: WidgetId,
        key: &str,
        value: Value,
        binding: Option<&EventBinding>,
    ) -> CanvasResult<UpdateOutcome> {
        let outcome = self.widgets.update(id, key, value, binding)?;
        if let Some(payload) = outcome.payload.clone() {
            self.dispatcher.dispatch(payload);
        }
        Ok(outcome)
    }

    /// The user typed into an input widget.
    pub fn change_text(&mut self, id: WidgetId, text: &str) -> CanvasResult<UpdateOutcome> {
        let binding = self
            .kind_of(id)
            .and_then(|kind| kind.binding_for(self.widgets.get(id)?, "text"));
        self.update_meta(id, "text", Value::String(text.to_string()), binding.as_ref())
    }

    /// The user picked `values` in a tree-select widget.
    pub fn change_options(&mut self, id: WidgetId, values: Vec<Value>) -> CanvasResult<Vec<UpdateOutcome>> {
        let instance = self.instance(id)?;
        let edits = self
            .kind_of(id)
            .map(|kind| kind.option_change(instance, &values))
            .unwrap_or_default();
        edits
            .into_iter()
            .map(|edit| self.update_meta(id, &edit.key, edit.value, edit.binding.as_ref()))
            .collect()
    }

    /// Focus or blur a widget. Focus never dirties an instance.
    pub fn set_focus(&mut self, id: WidgetId, focused: bool) -> CanvasResult<()> {
        self.instance(id)?;
        let previous = self.widgets.focused();
        if focused {
            if let Some(previous) = previous.filter(|p| *p != id) {
                self.write_focus_flag(previous, false)?;
            }
            self.widgets.set_focus(Some(id))?;
        } else if previous == Some(id) {
            self.widgets.set_focus(None)?;
        }
        self.write_focus_flag(id, focused)
    }

    /// Blur whichever widget has focus.
    pub fn clear_focus(&mut self) -> CanvasResult<()> {
        match self.widgets.focused() {
            Some(id) => self.set_focus(id, false),
            None => Ok(()),
        }
    }

    fn write_focus_flag(&mut self, id: WidgetId, focused: bool) -> CanvasResult<()> {
        let declares_focus = self
            .widgets
            .get(id)
            .is_some_and(|instance| instance.schema().schema().is_meta("isFocused"));
        if declares_focus {
            self.apply_runtime_edits(id, vec![MetaEdit::new("isFocused", Value::Bool(focused))])?;
        }
        Ok(())
    }

    /// Apply runtime writes and whatever writes the kind chains onto them.
    fn apply_runtime_edits(&mut self, id: WidgetId, edits: Vec<MetaEdit>) -> CanvasResult<()> {
        let kind = self.kind_of(id);
        let mut pending = edits;
        for _ in 0..MAX_HOOK_PASSES {
            if pending.is_empty() {
                return Ok(());
            }
            let mut follow_up = Vec::new();
            for edit in pending {
                if self.widgets.write(id, &edit.key, edit.value)? {
                    if let Some(kind) = kind {
                        follow_up.extend(kind.on_meta_written(self.instance(id)?, &edit.key));
                    }
                }
            }
            pending = follow_up;
        }
        if !pending.is_empty() {
            log::warn!("Dropped {} chained meta write(s) on {}", pending.len(), id);
        }
        Ok(())
    }

    /// Current value of any property on widget `id`. `None` is `undefined`.
    pub fn resolve(&mut self, id: WidgetId, name: &str) -> CanvasResult<Option<Value>> {
        self.widgets.resolve(id, name, self.evaluator.as_ref())
    }

    /// Every derived property of widget `id`, brought up to date.
    pub fn derived_values(&mut self, id: WidgetId) -> CanvasResult<IndexMap<String, Option<Value>>> {
        let instance = self.widgets.get_mut(id).ok_or(CanvasError::UnknownWidget(id))?;
        Ok(instance.derived_values(self.evaluator.as_ref()))
    }

    /// Feed a pointer event through the selection state machine.
    pub fn handle_pointer(&mut self, event: &CanvasEvent, capabilities: Capabilities) -> Vec<ShellCommand> {
        let state = std::mem::take(&mut self.selection);
        let (next, commands) = transition(state, event, capabilities, &self.config.selection, &self.document);
        self.selection = next;
        commands
    }

    /// Swap in a reloaded registry. Instances whose schema changed are rebound
    /// and their derived caches invalidated.
    pub fn reload_registry(&mut self, registry: Arc<SchemaRegistry>) {
        for instance in self.widgets.iter_mut() {
            match registry.resolve(instance.widget_type()) {
                Ok(schema) if !Arc::ptr_eq(&schema, instance.schema()) => instance.rebind(schema),
                Ok(_) => {}
                Err(e) => log::warn!("Keeping previous schema for {}: {}", instance.id(), e),
            }
        }
        self.registry = registry;
    }
}
