//! Meta-state store for every widget instance on the canvas.

use super::{WidgetId, WidgetInstance};
use crate::action::{EventBinding, EventPayload};
use crate::error::{CanvasError, CanvasResult};
use crate::expression::ExpressionEvaluator;
use crate::schema::CompiledSchema;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What a user-driven meta update did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// The stored value changed.
    pub changed: bool,
    /// This call flipped the instance from clean to dirty.
    pub marked_dirty: bool,
    /// The identical update already ran this turn; nothing happened.
    pub duplicate: bool,
    /// Payload for the action runtime, when a binding was supplied.
    pub payload: Option<EventPayload>,
}

/// What a persisted-property write did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChange {
    /// The parsed value changed.
    pub changed: bool,
    /// The property seeds meta state and its change reset the instance.
    pub default_changed: bool,
    /// Meta keys whose value was re-seeded.
    pub reseeded: Vec<String>,
}

/// Owns all widget instances and routes edits into them.
///
/// User edits enter through [`WidgetManager::update`], which tracks the dirty
/// flag and the per-turn ledger. Writes made by the runtime itself
/// (materialized selections, focus) go through [`WidgetManager::write`] and
/// never dirty an instance.
#[derive(Debug, Clone)]
pub struct WidgetManager {
    instances: IndexMap<WidgetId, WidgetInstance>,
    /// `(instance, key)` -> value already applied this turn.
    ledger: HashMap<(WidgetId, String), Value>,
    /// Widget that has keyboard focus.
    focused: Option<WidgetId>,
}

impl WidgetManager {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            instances: IndexMap::new(),
            ledger: HashMap::new(),
            focused: None,
        }
    }

    /// Create the instance `id` and seed its meta state.
    pub fn initialize(
        &mut self,
        id: WidgetId,
        schema: Arc<CompiledSchema>,
        properties: IndexMap<String, Value>,
    ) -> &mut WidgetInstance {
        log::debug!("Initializing {} {}", schema.widget_type(), id);
        let instance = WidgetInstance::new(id, schema, properties);
        self.instances.insert(id, instance);
        &mut self.instances[&id]
    }

    pub fn get(&self, id: WidgetId) -> Option<&WidgetInstance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut WidgetInstance> {
        self.instances.get_mut(&id)
    }

    fn instance_mut(&mut self, id: WidgetId) -> CanvasResult<&mut WidgetInstance> {
        self.instances.get_mut(&id).ok_or(CanvasError::UnknownWidget(id))
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.instances.keys().copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WidgetInstance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Start a new logical turn.
    pub fn begin_turn(&mut self) {
        self.ledger.clear();
    }

    /// Apply a user edit to meta property `key`.
    ///
    /// Dirties the instance the first time the value actually changes and
    /// builds the binding's payload. Repeating the identical update within the
    /// same turn is a no-op.
    pub fn update(
        &mut self,
        id: WidgetId,
        key: &str,
        value: Value,
        binding: Option<&EventBinding>,
    ) -> CanvasResult<UpdateOutcome> {
        let instance = self.instance_mut(id)?;
        ensure_meta(instance, key)?;

        let ledger_key = (id, key.to_string());
        if self.ledger.get(&ledger_key) == Some(&value) {
            log::debug!("Ignoring repeated update of {} on {}", key, id);
            return Ok(UpdateOutcome {
                duplicate: true,
                ..Default::default()
            });
        }

        let instance = self.instance_mut(id)?;
        let changed = instance.set_meta(key, value.clone());
        let marked_dirty = changed && instance.set_dirty(true);
        self.ledger.insert(ledger_key, value);
        Ok(UpdateOutcome {
            changed,
            marked_dirty,
            duplicate: false,
            payload: binding.map(EventBinding::payload),
        })
    }

    /// Runtime-originated meta write. Never dirties and bypasses the ledger.
    pub fn write(&mut self, id: WidgetId, key: &str, value: Value) -> CanvasResult<bool> {
        let instance = self.instance_mut(id)?;
        ensure_meta(instance, key)?;
        Ok(instance.set_meta(key, value))
    }

    pub fn set_dirty(&mut self, id: WidgetId, dirty: bool) -> CanvasResult<bool> {
        Ok(self.instance_mut(id)?.set_dirty(dirty))
    }

    /// Store a persisted property.
    ///
    /// When the property seeds meta state and its parsed value changed, the
    /// instance is reset: dirty is cleared and every fed meta key re-seeded.
    pub fn set_property(&mut self, id: WidgetId, name: &str, value: Value) -> CanvasResult<PropertyChange> {
        let instance = self.instance_mut(id)?;
        let changed = instance.set_property(name, value);
        let is_source = instance.schema().schema().default_targets(name).next().is_some();
        if !changed || !is_source {
            return Ok(PropertyChange {
                changed,
                ..Default::default()
            });
        }
        instance.set_dirty(false);
        let reseeded = instance.reseed_from(name);
        log::debug!("Default {} changed on {}, re-seeded {:?}", name, id, reseeded);
        Ok(PropertyChange {
            changed,
            default_changed: true,
            reseeded,
        })
    }

    /// Move keyboard focus. `None` clears it.
    pub fn set_focus(&mut self, id: Option<WidgetId>) -> CanvasResult<()> {
        if let Some(id) = id {
            if !self.contains(id) {
                return Err(CanvasError::UnknownWidget(id));
            }
        }
        self.focused = id;
        Ok(())
    }

    pub fn focused(&self) -> Option<WidgetId> {
        self.focused
    }

    /// Current value of `name` on instance `id`.
    pub fn resolve(
        &mut self,
        id: WidgetId,
        name: &str,
        evaluator: &dyn ExpressionEvaluator,
    ) -> CanvasResult<Option<Value>> {
        Ok(self.instance_mut(id)?.resolve(name, evaluator))
    }

    /// Remove a deleted widget's state.
    pub fn remove(&mut self, id: WidgetId) -> Option<WidgetInstance> {
        self.ledger.retain(|(owner, _), _| *owner != id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.instances.shift_remove(&id)
    }
}

impl Default for WidgetManager {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_meta(instance: &WidgetInstance, key: &str) -> CanvasResult<()> {
    if instance.schema().schema().is_meta(key) {
        Ok(())
    } else {
        Err(CanvasError::UnknownMetaProperty {
            widget_type: instance.widget_type().to_string(),
            key: key.to_string(),
        })
    }
}
