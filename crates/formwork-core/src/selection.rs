//! Drag-to-select on the canvas.
//!
//! The state is a plain value: [`transition`] takes the current state and an
//! event and returns the next state plus the commands the shell must apply.
//! A gesture is `Idle -> Dragging -> Idle`; the commit on pointer-up is the
//! selected step and is reported through [`ShellCommand::SelectionChanged`].

use crate::config::{HitMode, SelectionConfig};
use crate::input::{CanvasEvent, Capabilities};
use crate::widget::WidgetId;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Selection rectangle for marquee selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    /// Pointer-down point. Fixed for the whole gesture.
    pub start: Point,
    /// Live corner.
    pub current: Point,
}

impl SelectionRect {
    pub fn new(start: Point) -> Self {
        Self { start, current: start }
    }

    /// Get the selection rectangle as a normalized Rect.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.start.x.min(self.current.x),
            self.start.y.min(self.current.y),
            self.start.x.max(self.current.x),
            self.start.y.max(self.current.y),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SelectionPhase {
    #[default]
    Idle,
    Dragging(SelectionRect),
}

/// Canvas selection, owned by the canvas and threaded through [`transition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub phase: SelectionPhase,
    /// Committed selection.
    pub selected: Vec<WidgetId>,
    /// Widgets under the live rectangle while dragging.
    pub preview: Vec<WidgetId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, SelectionPhase::Dragging(_))
    }

    /// The live rectangle, while dragging.
    pub fn rect(&self) -> Option<Rect> {
        match self.phase {
            SelectionPhase::Dragging(rect) => Some(rect.to_rect()),
            SelectionPhase::Idle => None,
        }
    }
}

/// Side effects the editor shell applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ShellCommand {
    /// Toggle the shell's "canvas is selecting" flag.
    SetCanvasSelecting { active: bool, origin: Option<Point> },
    ClearFocus,
    DeselectAll,
    ClosePropertyPane,
    CloseFilterPane,
    SelectionChanged { ids: Vec<WidgetId> },
}

/// Spatial lookup of widgets by rectangle.
pub trait HitTest {
    /// Ids of widgets whose bounds match `rect` under `mode`, back to front.
    fn widgets_in_rect(&self, rect: Rect, mode: HitMode) -> Vec<WidgetId>;
}

/// Whether widget `bounds` match selection `rect` under `mode`.
///
/// Edges are inclusive: a rectangle touching a widget's border hits it, and
/// a drag that is flat along one axis still sweeps through widgets.
pub fn hits(rect: Rect, bounds: Rect, mode: HitMode) -> bool {
    match mode {
        HitMode::Intersects => {
            rect.x0 <= bounds.x1 && bounds.x0 <= rect.x1 && rect.y0 <= bounds.y1 && bounds.y0 <= rect.y1
        }
        HitMode::Contains => {
            bounds.x0 >= rect.x0 && bounds.y0 >= rect.y0 && bounds.x1 <= rect.x1 && bounds.y1 <= rect.y1
        }
    }
}

/// Advance the state machine by one event.
pub fn transition(
    mut state: SelectionState,
    event: &CanvasEvent,
    capabilities: Capabilities,
    config: &SelectionConfig,
    hit_test: &dyn HitTest,
) -> (SelectionState, Vec<ShellCommand>) {
    match (state.phase, *event) {
        (
            SelectionPhase::Idle,
            CanvasEvent::PointerDown {
                position,
                over_empty_canvas,
            },
        ) => {
            if !over_empty_canvas || !capabilities.drag_to_select {
                return (state, Vec::new());
            }
            log::debug!("Selection gesture started at ({}, {})", position.x, position.y);
            state.phase = SelectionPhase::Dragging(SelectionRect::new(position));
            state.preview.clear();
            let commands = vec![ShellCommand::SetCanvasSelecting {
                active: true,
                origin: Some(position),
            }];
            (state, commands)
        }
        (SelectionPhase::Dragging(mut rect), CanvasEvent::PointerMove { position }) => {
            rect.current = position;
            state.phase = SelectionPhase::Dragging(rect);
            state.preview = hit_test.widgets_in_rect(rect.to_rect(), config.hit_mode);
            (state, Vec::new())
        }
        (SelectionPhase::Dragging(mut rect), CanvasEvent::PointerUp { position }) => {
            rect.current = position;
            let ids = if rect.start.distance(rect.current) < config.drag_threshold {
                Vec::new()
            } else {
                hit_test.widgets_in_rect(rect.to_rect(), config.hit_mode)
            };
            log::debug!("Selection gesture committed {} widget(s)", ids.len());
            state.phase = SelectionPhase::Idle;
            state.preview.clear();
            state.selected = ids.clone();
            let commands = vec![
                ShellCommand::ClearFocus,
                ShellCommand::DeselectAll,
                ShellCommand::ClosePropertyPane,
                ShellCommand::CloseFilterPane,
                ShellCommand::SetCanvasSelecting {
                    active: false,
                    origin: None,
                },
                ShellCommand::SelectionChanged { ids },
            ];
            (state, commands)
        }
        (SelectionPhase::Dragging(_), CanvasEvent::PointerLeave | CanvasEvent::FocusLost) => {
            log::debug!("Selection gesture cancelled");
            state.phase = SelectionPhase::Idle;
            state.preview.clear();
            let commands = vec![ShellCommand::SetCanvasSelecting {
                active: false,
                origin: None,
            }];
            (state, commands)
        }
        _ => (state, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct Boxes(Vec<(WidgetId, Rect)>);

    impl HitTest for Boxes {
        fn widgets_in_rect(&self, rect: Rect, mode: HitMode) -> Vec<WidgetId> {
            self.0
                .iter()
                .filter(|(_, bounds)| hits(rect, *bounds, mode))
                .map(|(id, _)| *id)
                .collect()
        }
    }

    fn layout() -> (Boxes, WidgetId, WidgetId, WidgetId) {
        let inside = Uuid::new_v4();
        let straddling = Uuid::new_v4();
        let outside = Uuid::new_v4();
        let boxes = Boxes(vec![
            (inside, Rect::new(20.0, 20.0, 50.0, 40.0)),
            (straddling, Rect::new(100.0, 50.0, 200.0, 100.0)),
            (outside, Rect::new(300.0, 300.0, 350.0, 320.0)),
        ]);
        (boxes, inside, straddling, outside)
    }

    fn run(
        state: SelectionState,
        events: &[CanvasEvent],
        config: &SelectionConfig,
        boxes: &Boxes,
    ) -> (SelectionState, Vec<ShellCommand>) {
        let mut state = state;
        let mut all = Vec::new();
        for event in events {
            let (next, commands) = transition(state, event, Capabilities::default(), config, boxes);
            state = next;
            all.extend(commands);
        }
        (state, all)
    }

    fn down(x: f64, y: f64) -> CanvasEvent {
        CanvasEvent::PointerDown {
            position: Point::new(x, y),
            over_empty_canvas: true,
        }
    }

    #[test]
    fn test_to_rect_normalizes() {
        let rect = SelectionRect {
            start: Point::new(110.0, 60.0),
            current: Point::new(10.0, 10.0),
        };
        assert_eq!(rect.to_rect(), Rect::new(10.0, 10.0, 110.0, 60.0));
    }

    #[test]
    fn test_drag_selects_intersecting() {
        let (boxes, inside, straddling, _) = layout();
        let events = [
            down(10.0, 10.0),
            CanvasEvent::PointerMove {
                position: Point::new(110.0, 60.0),
            },
            CanvasEvent::PointerUp {
                position: Point::new(110.0, 60.0),
            },
        ];
        let (state, commands) = run(SelectionState::new(), &events, &SelectionConfig::default(), &boxes);
        assert_eq!(state.selected, vec![inside, straddling]);
        assert!(!state.is_dragging());
        assert!(commands.contains(&ShellCommand::DeselectAll));
        assert!(commands.contains(&ShellCommand::ClosePropertyPane));
        assert_eq!(
            commands.last(),
            Some(&ShellCommand::SelectionChanged {
                ids: vec![inside, straddling]
            })
        );
    }

    #[test]
    fn test_contains_mode() {
        let (boxes, inside, _, _) = layout();
        let config = SelectionConfig {
            hit_mode: HitMode::Contains,
            ..Default::default()
        };
        let events = [
            down(10.0, 10.0),
            CanvasEvent::PointerUp {
                position: Point::new(110.0, 60.0),
            },
        ];
        let (state, _) = run(SelectionState::new(), &events, &config, &boxes);
        assert_eq!(state.selected, vec![inside]);
    }

    #[test]
    fn test_leave_cancels_and_keeps_selection() {
        let (boxes, _, _, outside) = layout();
        let previous = SelectionState {
            selected: vec![outside],
            ..Default::default()
        };
        let events = [
            down(10.0, 10.0),
            CanvasEvent::PointerMove {
                position: Point::new(110.0, 60.0),
            },
            CanvasEvent::PointerLeave,
        ];
        let (state, commands) = run(previous, &events, &SelectionConfig::default(), &boxes);
        assert_eq!(state.selected, vec![outside]);
        assert!(state.preview.is_empty());
        assert!(!state.is_dragging());
        assert!(!commands.iter().any(|c| matches!(c, ShellCommand::SelectionChanged { .. })));
    }

    #[test]
    fn test_flat_drag_sweeps_through() {
        let widget = Uuid::new_v4();
        let boxes = Boxes(vec![(widget, Rect::new(20.0, 20.0, 60.0, 80.0))]);
        let events = [
            down(0.0, 50.0),
            CanvasEvent::PointerMove {
                position: Point::new(200.0, 50.0),
            },
            CanvasEvent::PointerUp {
                position: Point::new(200.0, 50.0),
            },
        ];
        let (state, _) = run(SelectionState::new(), &events, &SelectionConfig::default(), &boxes);
        assert_eq!(state.selected, vec![widget]);
    }

    #[test]
    fn test_touching_edge_counts() {
        let bounds = Rect::new(20.0, 20.0, 60.0, 80.0);
        assert!(hits(Rect::new(60.0, 0.0, 100.0, 20.0), bounds, HitMode::Intersects));
        assert!(!hits(Rect::new(61.0, 0.0, 100.0, 100.0), bounds, HitMode::Intersects));
    }

    #[test]
    fn test_focus_lost_cancels_and_keeps_selection() {
        let (boxes, inside, _, outside) = layout();
        let previous = SelectionState {
            selected: vec![outside],
            ..Default::default()
        };
        let events = [
            down(10.0, 10.0),
            CanvasEvent::PointerMove {
                position: Point::new(110.0, 60.0),
            },
            CanvasEvent::FocusLost,
        ];
        let (state, commands) = run(previous, &events, &SelectionConfig::default(), &boxes);
        assert_eq!(state.phase, SelectionPhase::Idle);
        assert_eq!(state.selected, vec![outside]);
        assert!(!state.selected.contains(&inside));
        assert!(state.preview.is_empty());
        assert!(!commands.iter().any(|c| matches!(c, ShellCommand::SelectionChanged { .. })));
        assert_eq!(
            commands.last(),
            Some(&ShellCommand::SetCanvasSelecting {
                active: false,
                origin: None
            })
        );
    }

    #[test]
    fn test_preview_tracks_rect() {
        let (boxes, inside, _, _) = layout();
        let events = [
            down(10.0, 10.0),
            CanvasEvent::PointerMove {
                position: Point::new(60.0, 45.0),
            },
        ];
        let (state, commands) = run(SelectionState::new(), &events, &SelectionConfig::default(), &boxes);
        assert!(state.is_dragging());
        assert_eq!(state.preview, vec![inside]);
        assert_eq!(state.rect(), Some(Rect::new(10.0, 10.0, 60.0, 45.0)));
        assert_eq!(
            commands,
            vec![ShellCommand::SetCanvasSelecting {
                active: true,
                origin: Some(Point::new(10.0, 10.0))
            }]
        );
    }

    #[test]
    fn test_click_below_threshold_clears() {
        let (boxes, inside, _, _) = layout();
        let config = SelectionConfig {
            drag_threshold: 4.0,
            ..Default::default()
        };
        let previous = SelectionState {
            selected: vec![inside],
            ..Default::default()
        };
        let events = [
            down(30.0, 30.0),
            CanvasEvent::PointerUp {
                position: Point::new(31.0, 31.0),
            },
        ];
        let (state, commands) = run(previous, &events, &config, &boxes);
        assert!(state.selected.is_empty());
        assert!(commands.contains(&ShellCommand::ClearFocus));
        assert!(commands.contains(&ShellCommand::SelectionChanged { ids: vec![] }));
    }

    #[test]
    fn test_gated_by_capability_and_target() {
        let (boxes, _, _, _) = layout();
        let denied = Capabilities { drag_to_select: false };
        let (state, commands) = transition(
            SelectionState::new(),
            &down(10.0, 10.0),
            denied,
            &SelectionConfig::default(),
            &boxes,
        );
        assert!(!state.is_dragging());
        assert!(commands.is_empty());

        let on_widget = CanvasEvent::PointerDown {
            position: Point::new(25.0, 25.0),
            over_empty_canvas: false,
        };
        let (state, _) = transition(
            SelectionState::new(),
            &on_widget,
            Capabilities::default(),
            &SelectionConfig::default(),
            &boxes,
        );
        assert!(!state.is_dragging());
    }
}
