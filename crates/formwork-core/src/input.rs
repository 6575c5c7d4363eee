//! Pointer events and capability flags delivered by the editor surface.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Canvas-level input consumed by the selection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanvasEvent {
    PointerDown {
        position: Point,
        /// The pointer landed on the canvas background, not on a widget.
        #[serde(default = "default_true")]
        over_empty_canvas: bool,
    },
    PointerMove {
        position: Point,
    },
    PointerUp {
        position: Point,
    },
    /// Pointer left the canvas area.
    PointerLeave,
    /// The window lost focus.
    FocusLost,
}

fn default_true() -> bool {
    true
}

/// Interaction capabilities owned by the shell (current mode, permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Drag-to-select is permitted in the current interaction mode.
    pub drag_to_select: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { drag_to_select: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_json() {
        let event: CanvasEvent =
            serde_json::from_value(json!({ "kind": "pointer_down", "position": { "x": 10.0, "y": 10.0 } })).unwrap();
        assert_eq!(
            event,
            CanvasEvent::PointerDown {
                position: Point::new(10.0, 10.0),
                over_empty_canvas: true
            }
        );
        let leave: CanvasEvent = serde_json::from_value(json!({ "kind": "pointer_leave" })).unwrap();
        assert_eq!(leave, CanvasEvent::PointerLeave);
    }
}
