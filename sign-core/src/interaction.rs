//! # Interaction Manager
//!
//! Pointer gesture state machine for one page overlay.
//!
//! ```text
//!            press on handle              release
//!   Idle ─────────────────────► Resizing ─────────► Idle (ResizeEnd if changed)
//!    │
//!    │ press on draggable body              release
//!    └────────────────────────► Dragging ─────────► Idle (DragEnd if moved,
//!                                                        Click otherwise)
//! ```
//!
//! Only one gesture is active at a time; presses arriving during a gesture are
//! ignored until the active gesture is released or cancelled.

use serde::{Deserialize, Serialize};

use crate::bus::{DragEnd, ResizeEnd};
use crate::field::FieldId;
use crate::geometry::{Point, Rect};

/// Compass direction of a resize handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleDirection {
    /// Top-left corner.
    Nw,
    /// Top edge midpoint.
    N,
    /// Top-right corner.
    Ne,
    /// Right edge midpoint.
    E,
    /// Bottom-right corner.
    Se,
    /// Bottom edge midpoint.
    S,
    /// Bottom-left corner.
    Sw,
    /// Left edge midpoint.
    W,
}

impl HandleDirection {
    /// All handles, corners and edges.
    pub const ALL: [Self; 8] = [
        Self::Nw,
        Self::N,
        Self::Ne,
        Self::E,
        Self::Se,
        Self::S,
        Self::Sw,
        Self::W,
    ];

    /// Whether the handle moves the top edge.
    #[must_use]
    pub const fn moves_top(self) -> bool {
        matches!(self, Self::Nw | Self::N | Self::Ne)
    }

    /// Whether the handle moves the bottom edge.
    #[must_use]
    pub const fn moves_bottom(self) -> bool {
        matches!(self, Self::Sw | Self::S | Self::Se)
    }

    /// Whether the handle moves the left edge.
    #[must_use]
    pub const fn moves_left(self) -> bool {
        matches!(self, Self::Nw | Self::W | Self::Sw)
    }

    /// Whether the handle moves the right edge.
    #[must_use]
    pub const fn moves_right(self) -> bool {
        matches!(self, Self::Ne | Self::E | Self::Se)
    }

    /// Where the handle sits on a screen rect.
    #[must_use]
    pub fn anchor_on(self, rect: &Rect) -> Point {
        let x = if self.moves_left() {
            rect.x
        } else if self.moves_right() {
            rect.right()
        } else {
            rect.x + rect.width / 2.0
        };
        let y = if self.moves_top() {
            rect.y
        } else if self.moves_bottom() {
            rect.bottom()
        } else {
            rect.y + rect.height / 2.0
        };
        Point::new(x, y)
    }

    /// CSS-style cursor name.
    #[must_use]
    pub const fn cursor(self) -> &'static str {
        match self {
            Self::Nw | Self::Se => "nwse-resize",
            Self::Ne | Self::Sw => "nesw-resize",
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
        }
    }
}

/// What lies under the pointer on an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "camelCase")]
pub enum HitTarget {
    /// A visible resize handle.
    ResizeHandle {
        /// Owning field.
        field_id: FieldId,
        /// Handle direction.
        direction: HandleDirection,
    },
    /// A visible delete control.
    DeleteControl {
        /// Owning field.
        field_id: FieldId,
    },
    /// The body of a field.
    Field {
        /// Hit field.
        field_id: FieldId,
    },
    /// Nothing interactive.
    Empty,
}

impl HitTarget {
    /// Field the target belongs to, if any.
    #[must_use]
    pub fn field_id(&self) -> Option<&FieldId> {
        match self {
            Self::ResizeHandle { field_id, .. }
            | Self::DeleteControl { field_id }
            | Self::Field { field_id } => Some(field_id),
            Self::Empty => None,
        }
    }
}

/// A classified pointer press with the geometry needed to start a gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Press {
    /// Page the overlay belongs to.
    pub page_index: usize,
    /// What was pressed.
    pub target: HitTarget,
    /// Field rect in page-local screen pixels (for field targets).
    pub field_rect: Option<Rect>,
    /// Whether the pressed field may be dragged.
    pub draggable: bool,
    /// Client position of the page's top-left corner.
    pub page_origin: Point,
    /// Page bounds in page-local screen pixels.
    pub page_bounds: Rect,
}

/// Drag in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    /// Dragged field.
    pub field_id: FieldId,
    /// Page the drag started on.
    pub page_index: usize,
    /// Pointer at press (client).
    pub start_pointer: Point,
    /// Element rect at press (client).
    pub start_element: Rect,
    /// Ghost rect (client).
    pub ghost: Rect,
    /// Whether the movement threshold has been crossed.
    pub moved: bool,
}

/// Resize in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    /// Resized field.
    pub field_id: FieldId,
    /// Page the field lives on.
    pub page_index: usize,
    /// Active handle.
    pub direction: HandleDirection,
    /// Pointer at press (client).
    pub start_pointer: Point,
    /// Field rect at press (page-local).
    pub start_rect: Rect,
    /// Current rect (page-local).
    pub current_rect: Rect,
    /// Page bounds (page-local).
    pub bounds: Rect,
}

/// Gesture currently recognised.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    /// No gesture.
    #[default]
    Idle,
    /// A field is being moved.
    Dragging(DragState),
    /// A field is being resized.
    Resizing(ResizeState),
}

/// Visual feedback produced while a gesture moves.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureUpdate {
    /// Ghost of the dragged field moved (client coordinates).
    Drag {
        /// Dragged field.
        field_id: FieldId,
        /// Ghost rect.
        ghost: Rect,
    },
    /// Field outline changed (page-local coordinates).
    Resize {
        /// Resized field.
        field_id: FieldId,
        /// New rect.
        rect: Rect,
    },
}

/// What a release produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Nothing to report.
    None,
    /// A press and release without a gesture, or a drag below the threshold.
    Click(HitTarget),
    /// A drag that moved.
    Dragged(DragEnd),
    /// A resize that changed the rect.
    Resized(ResizeEnd),
}

/// Gesture recognizer for one overlay.
#[derive(Debug, Clone)]
pub struct InteractionManager {
    gesture: Gesture,
    pressed: Option<HitTarget>,
    drag_threshold: f64,
    min_size: f64,
}

impl Default for InteractionManager {
    fn default() -> Self {
        Self::new(3.0, 20.0)
    }
}

impl InteractionManager {
    /// Create a manager with a drag threshold and minimum resize size (px).
    #[must_use]
    pub fn new(drag_threshold: f64, min_size: f64) -> Self {
        Self {
            gesture: Gesture::Idle,
            pressed: None,
            drag_threshold,
            min_size,
        }
    }

    /// Current gesture.
    #[must_use]
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Whether a drag or resize is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    /// Field involved in the active gesture.
    #[must_use]
    pub fn active_field(&self) -> Option<&FieldId> {
        match &self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging(drag) => Some(&drag.field_id),
            Gesture::Resizing(resize) => Some(&resize.field_id),
        }
    }

    /// Handle a pointer press.
    ///
    /// Returns `true` if a gesture started. A press while a gesture is active
    /// is ignored.
    pub fn pointer_down(&mut self, pointer: Point, press: Press) -> bool {
        if self.is_active() {
            tracing::debug!("Ignoring press while a gesture is active");
            return false;
        }

        let Press {
            page_index,
            target,
            field_rect,
            draggable,
            page_origin,
            page_bounds,
        } = press;

        match (&target, field_rect) {
            (HitTarget::ResizeHandle { field_id, direction }, Some(rect)) => {
                self.gesture = Gesture::Resizing(ResizeState {
                    field_id: field_id.clone(),
                    page_index,
                    direction: *direction,
                    start_pointer: pointer,
                    start_rect: rect,
                    current_rect: rect,
                    bounds: page_bounds,
                });
                self.pressed = None;
                true
            }
            (HitTarget::Field { field_id }, Some(rect)) if draggable => {
                let element = rect.translate(page_origin.x, page_origin.y);
                self.gesture = Gesture::Dragging(DragState {
                    field_id: field_id.clone(),
                    page_index,
                    start_pointer: pointer,
                    start_element: element,
                    ghost: element,
                    moved: false,
                });
                self.pressed = None;
                true
            }
            _ => {
                self.pressed = Some(target);
                false
            }
        }
    }

    /// Handle pointer movement.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<GestureUpdate> {
        let threshold = self.drag_threshold;
        let min_size = self.min_size;
        match &mut self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging(drag) => {
                let dx = pointer.x - drag.start_pointer.x;
                let dy = pointer.y - drag.start_pointer.y;
                if !drag.moved && pointer.distance_to(drag.start_pointer) > threshold {
                    drag.moved = true;
                }
                drag.ghost = drag.start_element.translate(dx, dy);
                Some(GestureUpdate::Drag {
                    field_id: drag.field_id.clone(),
                    ghost: drag.ghost,
                })
            }
            Gesture::Resizing(resize) => {
                let dx = pointer.x - resize.start_pointer.x;
                let dy = pointer.y - resize.start_pointer.y;
                resize.current_rect = resize_rect(
                    resize.start_rect,
                    resize.direction,
                    dx,
                    dy,
                    resize.bounds,
                    min_size,
                );
                Some(GestureUpdate::Resize {
                    field_id: resize.field_id.clone(),
                    rect: resize.current_rect,
                })
            }
        }
    }

    /// Handle pointer release, ending any gesture.
    pub fn pointer_up(&mut self, pointer: Point) -> GestureOutcome {
        if matches!(self.gesture, Gesture::Idle) {
            return self
                .pressed
                .take()
                .map_or(GestureOutcome::None, GestureOutcome::Click);
        }
        // Apply the final position before ending.
        let _ = self.pointer_move(pointer);

        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => GestureOutcome::None,
            Gesture::Dragging(drag) => {
                if drag.moved {
                    GestureOutcome::Dragged(DragEnd {
                        field_id: drag.field_id,
                        source_page: drag.page_index,
                        pointer,
                        element_origin: drag.ghost.origin(),
                    })
                } else {
                    GestureOutcome::Click(HitTarget::Field {
                        field_id: drag.field_id,
                    })
                }
            }
            Gesture::Resizing(resize) => {
                if resize.current_rect.approx_eq(&resize.start_rect, 1e-9) {
                    GestureOutcome::None
                } else {
                    GestureOutcome::Resized(ResizeEnd {
                        field_id: resize.field_id,
                        page_index: resize.page_index,
                        rect: resize.current_rect,
                    })
                }
            }
        }
    }

    /// Abandon any gesture without reporting it.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
        self.pressed = None;
    }
}

/// Apply a pointer delta to a rect through one handle.
///
/// Edges opposite the handle stay fixed; the result never shrinks below
/// `min_size` (unless the start rect already was smaller) and never leaves
/// `bounds`.
#[must_use]
pub fn resize_rect(
    start: Rect,
    direction: HandleDirection,
    dx: f64,
    dy: f64,
    bounds: Rect,
    min_size: f64,
) -> Rect {
    let mut rect = start;

    if direction.moves_right() {
        let max_width = bounds.right() - start.x;
        rect.width = (start.width + dx).max(min_size).min(max_width);
    }
    if direction.moves_left() {
        let effective = dx.min(start.width - min_size).max(bounds.x - start.x);
        rect.x = start.x + effective;
        rect.width = start.width - effective;
    }
    if direction.moves_bottom() {
        let max_height = bounds.bottom() - start.y;
        rect.height = (start.height + dy).max(min_size).min(max_height);
    }
    if direction.moves_top() {
        let effective = dy.min(start.height - min_size).max(bounds.y - start.y);
        rect.y = start.y + effective;
        rect.height = start.height - effective;
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Rect = Rect::new(0.0, 0.0, 612.0, 792.0);

    fn field_press(id: &str, rect: Rect, draggable: bool) -> Press {
        Press {
            page_index: 0,
            target: HitTarget::Field {
                field_id: id.into(),
            },
            field_rect: Some(rect),
            draggable,
            page_origin: Point::new(100.0, 50.0),
            page_bounds: BOUNDS,
        }
    }

    fn handle_press(id: &str, direction: HandleDirection, rect: Rect) -> Press {
        Press {
            target: HitTarget::ResizeHandle {
                field_id: id.into(),
                direction,
            },
            ..field_press(id, rect, true)
        }
    }

    #[test]
    fn test_drag_reports_pointer_and_element() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert!(manager.pointer_down(Point::new(120.0, 80.0), field_press("a", rect, true)));

        let update = manager.pointer_move(Point::new(150.0, 100.0));
        assert_eq!(
            update,
            Some(GestureUpdate::Drag {
                field_id: "a".into(),
                ghost: Rect::new(140.0, 90.0, 100.0, 50.0),
            })
        );

        match manager.pointer_up(Point::new(160.0, 110.0)) {
            GestureOutcome::Dragged(end) => {
                assert_eq!(end.field_id, FieldId::from("a"));
                assert_eq!(end.pointer, Point::new(160.0, 110.0));
                assert_eq!(end.element_origin, Point::new(150.0, 100.0));
            }
            other => panic!("expected drag end, got {other:?}"),
        }
        assert!(!manager.is_active());
    }

    #[test]
    fn test_small_movement_is_a_click() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        manager.pointer_down(Point::new(120.0, 80.0), field_press("a", rect, true));
        manager.pointer_move(Point::new(121.0, 81.0));
        assert_eq!(
            manager.pointer_up(Point::new(121.0, 81.0)),
            GestureOutcome::Click(HitTarget::Field {
                field_id: "a".into()
            })
        );
    }

    #[test]
    fn test_threshold_is_sticky() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        manager.pointer_down(Point::new(10.0, 10.0), field_press("a", rect, true));
        manager.pointer_move(Point::new(30.0, 10.0));
        // Returning to the start still counts as moved.
        assert!(matches!(
            manager.pointer_up(Point::new(10.0, 10.0)),
            GestureOutcome::Dragged(_)
        ));
    }

    #[test]
    fn test_non_draggable_field_passes_through_as_click() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        assert!(!manager.pointer_down(Point::new(10.0, 10.0), field_press("a", rect, false)));
        assert_eq!(manager.pointer_move(Point::new(200.0, 200.0)), None);
        assert!(matches!(
            manager.pointer_up(Point::new(200.0, 200.0)),
            GestureOutcome::Click(HitTarget::Field { .. })
        ));
    }

    #[test]
    fn test_delete_control_never_drags() {
        let mut manager = InteractionManager::default();
        let press = Press {
            target: HitTarget::DeleteControl {
                field_id: "a".into(),
            },
            ..field_press("a", Rect::new(0.0, 0.0, 50.0, 50.0), true)
        };
        assert!(!manager.pointer_down(Point::new(5.0, 5.0), press));
        assert_eq!(
            manager.pointer_up(Point::new(5.0, 5.0)),
            GestureOutcome::Click(HitTarget::DeleteControl {
                field_id: "a".into()
            })
        );
    }

    #[test]
    fn test_only_one_gesture_at_a_time() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        assert!(manager.pointer_down(Point::new(10.0, 10.0), field_press("a", rect, true)));
        assert!(!manager.pointer_down(
            Point::new(50.0, 50.0),
            handle_press("b", HandleDirection::Se, rect)
        ));
        assert_eq!(manager.active_field(), Some(&FieldId::from("a")));

        manager.pointer_move(Point::new(40.0, 40.0));
        assert!(matches!(
            manager.pointer_up(Point::new(40.0, 40.0)),
            GestureOutcome::Dragged(_)
        ));

        // After the first gesture ends a new one may begin.
        assert!(manager.pointer_down(
            Point::new(50.0, 50.0),
            handle_press("b", HandleDirection::Se, rect)
        ));
    }

    #[test]
    fn test_nw_resize_anchors_bottom_right() {
        let start = Rect::new(100.0, 100.0, 80.0, 60.0);
        let rect = resize_rect(start, HandleDirection::Nw, -10.0, -20.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(90.0, 80.0, 90.0, 80.0));
        assert!((rect.right() - start.right()).abs() < 1e-9);
        assert!((rect.bottom() - start.bottom()).abs() < 1e-9);
    }

    #[test]
    fn test_resize_respects_min_size() {
        let start = Rect::new(100.0, 100.0, 80.0, 60.0);
        let rect = resize_rect(start, HandleDirection::Se, -500.0, -500.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(100.0, 100.0, 20.0, 20.0));

        let rect = resize_rect(start, HandleDirection::Nw, 500.0, 500.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(160.0, 140.0, 20.0, 20.0));
    }

    #[test]
    fn test_resize_clamps_to_bounds() {
        let start = Rect::new(10.0, 10.0, 80.0, 60.0);
        let rect = resize_rect(start, HandleDirection::Nw, -50.0, -50.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(0.0, 0.0, 90.0, 70.0));

        let start = Rect::new(500.0, 700.0, 100.0, 80.0);
        let rect = resize_rect(start, HandleDirection::Se, 100.0, 100.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(500.0, 700.0, 112.0, 92.0));
    }

    #[test]
    fn test_edge_handle_moves_one_axis() {
        let start = Rect::new(100.0, 100.0, 80.0, 60.0);
        let rect = resize_rect(start, HandleDirection::E, 30.0, 45.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(100.0, 100.0, 110.0, 60.0));
        let rect = resize_rect(start, HandleDirection::N, 30.0, 10.0, BOUNDS, 20.0);
        assert_eq!(rect, Rect::new(100.0, 110.0, 80.0, 50.0));
    }

    #[test]
    fn test_resize_without_change_emits_nothing() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        manager.pointer_down(
            Point::new(50.0, 50.0),
            handle_press("a", HandleDirection::Se, rect),
        );
        assert_eq!(manager.pointer_up(Point::new(50.0, 50.0)), GestureOutcome::None);
    }

    #[test]
    fn test_resize_end_carries_final_rect() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        manager.pointer_down(
            Point::new(150.0, 100.0),
            handle_press("a", HandleDirection::Se, rect),
        );
        match manager.pointer_up(Point::new(170.0, 130.0)) {
            GestureOutcome::Resized(end) => {
                assert_eq!(end.rect, Rect::new(0.0, 0.0, 70.0, 80.0));
                assert_eq!(end.page_index, 0);
            }
            other => panic!("expected resize end, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_returns_to_idle_silently() {
        let mut manager = InteractionManager::default();
        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        manager.pointer_down(Point::new(10.0, 10.0), field_press("a", rect, true));
        manager.pointer_move(Point::new(100.0, 100.0));
        manager.cancel();
        assert!(!manager.is_active());
        assert_eq!(manager.pointer_up(Point::new(100.0, 100.0)), GestureOutcome::None);
    }

    #[test]
    fn test_handle_anchor_positions() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(HandleDirection::Nw.anchor_on(&rect), Point::new(0.0, 0.0));
        assert_eq!(HandleDirection::S.anchor_on(&rect), Point::new(50.0, 50.0));
        assert_eq!(HandleDirection::E.anchor_on(&rect), Point::new(100.0, 25.0));
    }
}
