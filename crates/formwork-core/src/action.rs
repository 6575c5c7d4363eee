//! Event bindings and the hand-off to the action runtime.
//!
//! The core never interprets a binding's expression. It builds a payload and
//! forwards it to an [`ActionDispatcher`], fire-and-forget.

use serde::{Deserialize, Serialize};

/// Kind of widget event a binding reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    OnTextChange,
    OnOptionChange,
}

/// A persisted trigger property and the opaque expression it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBinding {
    pub trigger_property_name: String,
    pub expression: String,
    pub event_type: EventType,
}

impl EventBinding {
    pub fn new(
        trigger_property_name: impl Into<String>,
        expression: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            trigger_property_name: trigger_property_name.into(),
            expression: expression.into(),
            event_type,
        }
    }

    /// Build the payload handed to the action runtime.
    pub fn payload(&self) -> EventPayload {
        EventPayload {
            trigger_property_name: self.trigger_property_name.clone(),
            expression: self.expression.clone(),
            event: EventDescriptor {
                event_type: self.event_type,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    #[serde(rename = "type")]
    pub event_type: EventType,
}

/// `{ triggerPropertyName, expression, event: { type } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub trigger_property_name: String,
    pub expression: String,
    pub event: EventDescriptor,
}

/// The external action-execution subsystem.
pub trait ActionDispatcher {
    /// Accept a payload. Must not block the caller.
    fn dispatch(&mut self, payload: EventPayload);
}

/// Dispatcher that buffers payloads until the host drains them.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    pending: Vec<EventPayload>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every buffered payload, oldest first.
    pub fn drain(&mut self) -> Vec<EventPayload> {
        std::mem::take(&mut self.pending)
    }
}

impl ActionDispatcher for ActionQueue {
    fn dispatch(&mut self, payload: EventPayload) {
        log::debug!(
            "Dispatching {:?} via {}",
            payload.event.event_type,
            payload.trigger_property_name
        );
        self.pending.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shape() {
        let binding = EventBinding::new("onOptionChange", "{{ showAlert('hi') }}", EventType::OnOptionChange);
        let payload = serde_json::to_value(binding.payload()).unwrap();
        assert_eq!(
            payload,
            json!({
                "triggerPropertyName": "onOptionChange",
                "expression": "{{ showAlert('hi') }}",
                "event": { "type": "ON_OPTION_CHANGE" }
            })
        );
    }

    #[test]
    fn test_queue_drain() {
        let mut queue = ActionQueue::new();
        let binding = EventBinding::new("onTextChanged", "", EventType::OnTextChange);
        queue.dispatch(binding.payload());
        queue.dispatch(binding.payload());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }
}
