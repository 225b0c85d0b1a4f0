//! # Field Overlay
//!
//! Retained visual state for the fields of one page. The overlay owns no
//! model: it receives copies of the page's fields, lays them out in screen
//! space for the current scale and page size, and translates pointer gestures
//! into visual feedback plus bus events for the controller to act on.
//!
//! Outer containers are sized in scaled screen pixels so hit testing works in
//! the same space as the pointer; content is laid out at unscaled size and
//! carries a `content_scale` transform so text and markup scale uniformly.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::bus::ViewerEvent;
use crate::config::ViewerConfig;
use crate::coords::doc_to_screen;
use crate::field::{Field, FieldId, FieldKind};
use crate::geometry::{PageSize, Point, Rect};
use crate::interaction::{
    GestureOutcome, GestureUpdate, HandleDirection, HitTarget, InteractionManager, Press,
};

/// Distance between the delete control and the top of its field.
const DELETE_CONTROL_GAP: f64 = 5.0;

/// Rendered content of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum ContentNode {
    /// Literal text, never parsed as markup.
    Text {
        /// Text to show.
        text: String,
        /// Whether whitespace is preserved and lines wrap.
        wrap: bool,
    },
    /// Markup injected as-is.
    Html {
        /// Raw HTML or SVG.
        markup: String,
    },
    /// Self-contained document rendered in an isolated frame.
    Frame {
        /// Embedded document source.
        document: String,
    },
    /// Image reference.
    Image {
        /// Image source, usually a data URI.
        src: String,
    },
}

impl ContentNode {
    /// Build the content node for a field.
    #[must_use]
    pub fn for_field(field: &Field) -> Self {
        match field.kind {
            FieldKind::Text => Self::Text {
                text: field.content.clone(),
                wrap: true,
            },
            FieldKind::Html => Self::Html {
                markup: field.content.clone(),
            },
            FieldKind::Signature => Self::Frame {
                document: field.content.clone(),
            },
            FieldKind::Image => Self::Image {
                src: field.content.clone(),
            },
        }
    }
}

/// A resize handle's on-screen box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandleVisual {
    /// Handle direction.
    pub direction: HandleDirection,
    /// Page-local screen rect.
    pub rect: Rect,
}

/// Visual state of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldVisual {
    /// Field shown.
    pub field_id: FieldId,
    /// Container rect in page-local screen pixels.
    pub outer: Rect,
    /// Content node.
    pub content: ContentNode,
    /// Unscaled content width.
    pub content_width: f64,
    /// Unscaled content height.
    pub content_height: f64,
    /// Transform applied to the content.
    pub content_scale: f64,
    /// Hidden until the page height is known.
    pub hidden: bool,
    /// Whether resize handles are shown.
    pub handles_visible: bool,
    /// Whether the delete control is shown.
    pub delete_visible: bool,
    /// A drag of this field is in progress.
    pub dragging: bool,
    /// A resize of this field is in progress.
    pub resizing: bool,
    /// Drag ghost in client coordinates.
    pub ghost: Option<Rect>,
    /// Resize handles (empty when not resizable).
    pub handles: Vec<HandleVisual>,
    /// Delete control rect (absent when not deletable).
    pub delete_control: Option<Rect>,
    /// Host style merged onto the container.
    pub style: BTreeMap<String, String>,
    /// Cursor over the body.
    pub cursor: &'static str,
}

/// Overlay for one page.
#[derive(Debug, Clone)]
pub struct FieldOverlay {
    page_index: usize,
    fields: Vec<Field>,
    visuals: Vec<FieldVisual>,
    scale: f64,
    page_size: Option<PageSize>,
    hovered: HashSet<FieldId>,
    selected: HashSet<FieldId>,
    interaction: InteractionManager,
    handle_size: f64,
    delete_size: f64,
}

impl FieldOverlay {
    /// Create an empty overlay for a page.
    #[must_use]
    pub fn new(page_index: usize, config: &ViewerConfig) -> Self {
        Self {
            page_index,
            fields: Vec::new(),
            visuals: Vec::new(),
            scale: config.initial_scale,
            page_size: None,
            hovered: HashSet::new(),
            selected: HashSet::new(),
            interaction: InteractionManager::new(config.drag_threshold_px, config.min_resize_px),
            handle_size: config.handle_size_px,
            delete_size: config.delete_control_size_px,
        }
    }

    /// Page this overlay belongs to.
    #[must_use]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Fields currently shown.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Visuals in paint order (last is topmost).
    #[must_use]
    pub fn visuals(&self) -> &[FieldVisual] {
        &self.visuals
    }

    /// Visual for one field.
    #[must_use]
    pub fn visual(&self, id: &FieldId) -> Option<&FieldVisual> {
        self.visuals.iter().find(|visual| &visual.field_id == id)
    }

    /// Current scale.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Unscaled page size, once known.
    #[must_use]
    pub fn page_size(&self) -> Option<PageSize> {
        self.page_size
    }

    /// The gesture recognizer.
    #[must_use]
    pub fn interaction(&self) -> &InteractionManager {
        &self.interaction
    }

    /// Replace the shown fields. Fields for other pages are ignored.
    pub fn set_fields(&mut self, fields: &[Field]) {
        self.fields = fields
            .iter()
            .filter(|field| field.page_index == self.page_index)
            .cloned()
            .collect();

        let ids: HashSet<&FieldId> = self.fields.iter().map(|field| &field.id).collect();
        self.hovered.retain(|id| ids.contains(id));
        self.selected.retain(|id| ids.contains(id));
        if self
            .interaction
            .active_field()
            .is_some_and(|id| !ids.contains(id))
        {
            tracing::debug!("Field under gesture disappeared, cancelling gesture");
            self.interaction.cancel();
        }

        self.relayout();
    }

    /// Change the scale and reposition every field.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.relayout();
    }

    /// Record the page size and reposition every field in one pass.
    pub fn set_page_size(&mut self, size: PageSize) {
        self.page_size = Some(size);
        self.relayout();
    }

    /// Mark a field hovered.
    pub fn hover_enter(&mut self, id: &FieldId) {
        if self.has_field(id) && self.hovered.insert(id.clone()) {
            self.refresh_controls();
        }
    }

    /// Clear the hover mark of a field.
    pub fn hover_leave(&mut self, id: &FieldId) {
        if self.hovered.remove(id) {
            self.refresh_controls();
        }
    }

    /// Select a field.
    pub fn select(&mut self, id: &FieldId) {
        if self.has_field(id) && self.selected.insert(id.clone()) {
            self.refresh_controls();
        }
    }

    /// Deselect a field.
    pub fn deselect(&mut self, id: &FieldId) {
        if self.selected.remove(id) {
            self.refresh_controls();
        }
    }

    /// Deselect every field.
    pub fn clear_selection(&mut self) {
        if !self.selected.is_empty() {
            self.selected.clear();
            self.refresh_controls();
        }
    }

    /// Whether a field shows its controls.
    #[must_use]
    pub fn is_active(&self, id: &FieldId) -> bool {
        self.hovered.contains(id) || self.selected.contains(id)
    }

    /// Recompute hover from a page-local pointer position.
    pub fn update_hover(&mut self, local: Point) {
        let hovered: HashSet<FieldId> = self
            .hit_test(local)
            .field_id()
            .cloned()
            .into_iter()
            .collect();
        if hovered != self.hovered {
            self.hovered = hovered;
            self.refresh_controls();
        }
    }

    /// What lies under a page-local point.
    ///
    /// The topmost field wins. Handles and delete controls only count while
    /// they are visible.
    #[must_use]
    pub fn hit_test(&self, local: Point) -> HitTarget {
        for visual in self.visuals.iter().rev().filter(|visual| !visual.hidden) {
            if visual.handles_visible {
                if let Some(handle) = visual.handles.iter().find(|h| h.rect.contains(local)) {
                    return HitTarget::ResizeHandle {
                        field_id: visual.field_id.clone(),
                        direction: handle.direction,
                    };
                }
            }
            if visual.delete_visible
                && visual
                    .delete_control
                    .is_some_and(|control| control.contains(local))
            {
                return HitTarget::DeleteControl {
                    field_id: visual.field_id.clone(),
                };
            }
            if visual.outer.contains(local) {
                return HitTarget::Field {
                    field_id: visual.field_id.clone(),
                };
            }
        }
        HitTarget::Empty
    }

    /// Handle a press. `page_origin` is the page's top-left in client space.
    ///
    /// Returns `true` if a drag or resize started.
    pub fn pointer_down(&mut self, pointer: Point, page_origin: Point) -> bool {
        let local = Point::new(pointer.x - page_origin.x, pointer.y - page_origin.y);
        let target = self.hit_test(local);

        let (field_rect, draggable) = match target.field_id().and_then(|id| self.visual(id)) {
            Some(visual) => {
                let draggable = self
                    .field(&visual.field_id)
                    .is_some_and(|field| field.draggable);
                (Some(visual.outer), draggable)
            }
            None => (None, false),
        };
        let page_bounds = self
            .page_size
            .map(|size| size.scaled(self.scale).bounds())
            .unwrap_or_default();

        let started = self.interaction.pointer_down(
            pointer,
            Press {
                page_index: self.page_index,
                target,
                field_rect,
                draggable,
                page_origin,
                page_bounds,
            },
        );
        if started {
            tracing::debug!(page = self.page_index, "Gesture started");
        }
        started
    }

    /// Handle pointer movement, updating drag ghost or resize outline.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<GestureUpdate> {
        let update = self.interaction.pointer_move(pointer)?;
        match &update {
            GestureUpdate::Drag { field_id, ghost } => {
                if let Some(visual) = self.visual_mut(field_id) {
                    visual.dragging = true;
                    visual.ghost = Some(*ghost);
                }
            }
            GestureUpdate::Resize { field_id, rect } => {
                let (handle_size, delete_size) = (self.handle_size, self.delete_size);
                if let Some(visual) = self.visual_mut(field_id) {
                    visual.resizing = true;
                    place_outer(visual, *rect, handle_size, delete_size);
                }
            }
        }
        Some(update)
    }

    /// Handle a release. Returns the events to publish on the bus.
    pub fn pointer_up(&mut self, pointer: Point) -> Vec<ViewerEvent> {
        let active = self.interaction.active_field().cloned();
        let outcome = self.interaction.pointer_up(pointer);

        if let Some(id) = active {
            self.reset_feedback(&id);
        }

        match outcome {
            GestureOutcome::None => Vec::new(),
            GestureOutcome::Dragged(end) => vec![ViewerEvent::DragEnd(end)],
            GestureOutcome::Resized(end) => vec![ViewerEvent::ResizeEnd(end)],
            GestureOutcome::Click(HitTarget::DeleteControl { field_id }) => {
                vec![ViewerEvent::FieldDelete { field_id }]
            }
            GestureOutcome::Click(HitTarget::Field { field_id }) => {
                self.selected.clear();
                self.selected.insert(field_id);
                self.refresh_controls();
                Vec::new()
            }
            GestureOutcome::Click(HitTarget::Empty) => {
                self.clear_selection();
                Vec::new()
            }
            GestureOutcome::Click(HitTarget::ResizeHandle { .. }) => Vec::new(),
        }
    }

    /// Abandon any gesture and drop its feedback.
    pub fn cancel_gesture(&mut self) {
        if let Some(id) = self.interaction.active_field().cloned() {
            self.reset_feedback(&id);
        }
        self.interaction.cancel();
    }

    fn has_field(&self, id: &FieldId) -> bool {
        self.fields.iter().any(|field| &field.id == id)
    }

    fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|field| &field.id == id)
    }

    fn visual_mut(&mut self, id: &FieldId) -> Option<&mut FieldVisual> {
        self.visuals.iter_mut().find(|visual| &visual.field_id == id)
    }

    /// Drop ghost and resize preview; the model decides the final geometry.
    fn reset_feedback(&mut self, id: &FieldId) {
        let Some(field) = self.field(id).cloned() else {
            return;
        };
        let visual = self.layout_field(&field);
        if let Some(slot) = self.visual_mut(id) {
            *slot = visual;
        }
    }

    fn relayout(&mut self) {
        self.visuals = self
            .fields
            .iter()
            .map(|field| self.layout_field(field))
            .collect();
    }

    fn refresh_controls(&mut self) {
        let active: Vec<bool> = self
            .visuals
            .iter()
            .map(|visual| self.is_active(&visual.field_id))
            .collect();
        for ((visual, field), active) in self.visuals.iter_mut().zip(&self.fields).zip(active) {
            visual.handles_visible = active && field.resizable;
            visual.delete_visible = active && field.deletable;
        }
    }

    fn layout_field(&self, field: &Field) -> FieldVisual {
        let active = self.is_active(&field.id);
        let mut visual = FieldVisual {
            field_id: field.id.clone(),
            outer: Rect::default(),
            content: ContentNode::for_field(field),
            content_width: field.rect.width,
            content_height: field.rect.height,
            content_scale: self.scale,
            hidden: true,
            handles_visible: active && field.resizable,
            delete_visible: active && field.deletable,
            dragging: false,
            resizing: false,
            ghost: None,
            handles: Vec::new(),
            delete_control: None,
            style: field.style.clone(),
            cursor: if field.draggable { "move" } else { "default" },
        };

        let Some(page) = self.page_size else {
            return visual;
        };
        visual.hidden = false;
        let outer = doc_to_screen(field.rect, page.height, self.scale);
        if field.resizable {
            visual.handles = handles_for(&outer, self.handle_size);
        }
        if field.deletable {
            visual.delete_control = Some(delete_control_for(&outer, self.delete_size));
        }
        visual.outer = outer;
        visual
    }
}

fn handles_for(outer: &Rect, size: f64) -> Vec<HandleVisual> {
    HandleDirection::ALL
        .iter()
        .map(|&direction| {
            let anchor = direction.anchor_on(outer);
            HandleVisual {
                direction,
                rect: Rect::new(anchor.x - size / 2.0, anchor.y - size / 2.0, size, size),
            }
        })
        .collect()
}

fn delete_control_for(outer: &Rect, size: f64) -> Rect {
    Rect::new(
        outer.right() - size,
        outer.y - size - DELETE_CONTROL_GAP,
        size,
        size,
    )
}

fn place_outer(visual: &mut FieldVisual, outer: Rect, handle_size: f64, delete_size: f64) {
    if !visual.handles.is_empty() {
        visual.handles = handles_for(&outer, handle_size);
    }
    if visual.delete_control.is_some() {
        visual.delete_control = Some(delete_control_for(&outer, delete_size));
    }
    visual.outer = outer;
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize::new(612.0, 792.0);

    fn overlay_with(fields: &[Field]) -> FieldOverlay {
        let mut overlay = FieldOverlay::new(0, &ViewerConfig::default());
        overlay.set_fields(fields);
        overlay.set_page_size(LETTER);
        overlay
    }

    fn sig(id: &str, rect: Rect) -> Field {
        Field::new(0, rect, FieldKind::Signature, "<html></html>").with_id(id)
    }

    #[test]
    fn test_hidden_until_page_size_known() {
        let mut overlay = FieldOverlay::new(0, &ViewerConfig::default());
        overlay.set_fields(&[sig("a", Rect::new(10.0, 10.0, 50.0, 20.0))]);
        assert!(overlay.visuals().iter().all(|visual| visual.hidden));

        overlay.set_page_size(LETTER);
        let visual = overlay.visual(&"a".into()).expect("should have visual");
        assert!(!visual.hidden);
        assert_eq!(visual.outer, Rect::new(10.0, 762.0, 50.0, 20.0));
    }

    #[test]
    fn test_filters_other_pages() {
        let mut other = sig("b", Rect::new(0.0, 0.0, 10.0, 10.0));
        other.page_index = 1;
        let overlay = overlay_with(&[sig("a", Rect::new(0.0, 0.0, 10.0, 10.0)), other]);
        assert_eq!(overlay.fields().len(), 1);
    }

    #[test]
    fn test_scale_changes_outer_not_content() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        overlay.set_scale(2.0);
        let visual = overlay.visual(&"a".into()).expect("should have visual");
        assert_eq!(visual.outer, Rect::new(200.0, 1304.0, 160.0, 80.0));
        assert!((visual.content_width - 80.0).abs() < f64::EPSILON);
        assert!((visual.content_scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_content_node_by_kind() {
        let field = Field::new(0, Rect::new(0.0, 0.0, 1.0, 1.0), FieldKind::Text, "<b>x</b>");
        assert_eq!(
            ContentNode::for_field(&field),
            ContentNode::Text {
                text: "<b>x</b>".to_string(),
                wrap: true
            }
        );
        let field = Field::new(0, Rect::new(0.0, 0.0, 1.0, 1.0), FieldKind::Signature, "doc");
        assert!(matches!(ContentNode::for_field(&field), ContentNode::Frame { .. }));
    }

    #[test]
    fn test_controls_only_while_active() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        let id = FieldId::from("a");
        let visual = overlay.visual(&id).expect("visual");
        assert_eq!(visual.handles.len(), 8);
        assert!(!visual.handles_visible && !visual.delete_visible);

        overlay.hover_enter(&id);
        let visual = overlay.visual(&id).expect("visual");
        assert!(visual.handles_visible && visual.delete_visible);

        overlay.hover_leave(&id);
        overlay.select(&id);
        assert!(overlay.visual(&id).expect("visual").handles_visible);
        overlay.deselect(&id);
        assert!(!overlay.visual(&id).expect("visual").handles_visible);
    }

    #[test]
    fn test_flags_remove_controls() {
        let field = sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))
            .with_resizable(false)
            .with_deletable(false)
            .with_draggable(false);
        let mut overlay = overlay_with(&[field]);
        overlay.select(&"a".into());
        let visual = overlay.visual(&"a".into()).expect("visual");
        assert!(visual.handles.is_empty());
        assert!(visual.delete_control.is_none());
        assert!(!visual.handles_visible && !visual.delete_visible);
        assert_eq!(visual.cursor, "default");
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let overlay = overlay_with(&[
            sig("bottom", Rect::new(100.0, 100.0, 80.0, 40.0)),
            sig("top", Rect::new(120.0, 110.0, 80.0, 40.0)),
        ]);
        // Point inside both: screen y for doc y 120 at height 792 is 672.
        let hit = overlay.hit_test(Point::new(150.0, 665.0));
        assert_eq!(hit, HitTarget::Field { field_id: "top".into() });
        assert_eq!(overlay.hit_test(Point::new(1.0, 1.0)), HitTarget::Empty);
    }

    #[test]
    fn test_hit_test_handles_only_when_visible() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        // Bottom-right corner in screen space.
        let corner = Point::new(180.0, 692.0);
        assert_eq!(overlay.hit_test(corner), HitTarget::Field { field_id: "a".into() });

        overlay.select(&"a".into());
        assert_eq!(
            overlay.hit_test(corner),
            HitTarget::ResizeHandle {
                field_id: "a".into(),
                direction: HandleDirection::Se
            }
        );
    }

    #[test]
    fn test_delete_control_click_emits_field_delete() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        overlay.select(&"a".into());
        let control = overlay
            .visual(&"a".into())
            .and_then(|visual| visual.delete_control)
            .expect("delete control");
        let origin = Point::new(0.0, 0.0);

        assert!(!overlay.pointer_down(control.center(), origin));
        let events = overlay.pointer_up(control.center());
        assert_eq!(events, vec![ViewerEvent::FieldDelete { field_id: "a".into() }]);
    }

    #[test]
    fn test_drag_shows_ghost_then_clears() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        let origin = Point::new(20.0, 20.0);
        let start = Point::new(160.0, 692.0);
        assert!(overlay.pointer_down(start, origin));

        overlay.pointer_move(Point::new(200.0, 700.0));
        let visual = overlay.visual(&"a".into()).expect("visual");
        assert!(visual.dragging);
        assert_eq!(visual.ghost, Some(Rect::new(160.0, 680.0, 80.0, 40.0)));

        let events = overlay.pointer_up(Point::new(200.0, 700.0));
        assert!(matches!(events.as_slice(), [ViewerEvent::DragEnd(_)]));
        let visual = overlay.visual(&"a".into()).expect("visual");
        assert!(!visual.dragging);
        assert!(visual.ghost.is_none());
    }

    #[test]
    fn test_resize_preview_reverts_until_model_updates() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        overlay.select(&"a".into());
        let origin = Point::new(0.0, 0.0);
        let corner = Point::new(180.0, 692.0);
        assert!(overlay.pointer_down(corner, origin));

        overlay.pointer_move(Point::new(200.0, 702.0));
        let visual = overlay.visual(&"a".into()).expect("visual");
        assert!(visual.resizing);
        assert_eq!(visual.outer, Rect::new(100.0, 652.0, 100.0, 50.0));

        let events = overlay.pointer_up(Point::new(200.0, 702.0));
        match events.as_slice() {
            [ViewerEvent::ResizeEnd(end)] => {
                assert_eq!(end.rect, Rect::new(100.0, 652.0, 100.0, 50.0));
            }
            other => panic!("expected resize end, got {other:?}"),
        }
        let visual = overlay.visual(&"a".into()).expect("visual");
        assert_eq!(visual.outer, Rect::new(100.0, 652.0, 80.0, 40.0));
    }

    #[test]
    fn test_click_selects_and_empty_click_clears() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        let origin = Point::new(0.0, 0.0);
        let body = Point::new(140.0, 672.0);
        overlay.pointer_down(body, origin);
        assert!(overlay.pointer_up(body).is_empty());
        assert!(overlay.is_active(&"a".into()));

        let empty = Point::new(5.0, 5.0);
        overlay.pointer_down(empty, origin);
        overlay.pointer_up(empty);
        assert!(!overlay.is_active(&"a".into()));
    }

    #[test]
    fn test_removed_field_cancels_gesture() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        overlay.pointer_down(Point::new(140.0, 672.0), Point::new(0.0, 0.0));
        assert!(overlay.interaction().is_active());
        overlay.set_fields(&[]);
        assert!(!overlay.interaction().is_active());
    }

    #[test]
    fn test_update_hover() {
        let mut overlay = overlay_with(&[sig("a", Rect::new(100.0, 100.0, 80.0, 40.0))]);
        overlay.update_hover(Point::new(140.0, 672.0));
        assert!(overlay.is_active(&"a".into()));
        overlay.update_hover(Point::new(5.0, 5.0));
        assert!(!overlay.is_active(&"a".into()));
    }
}
