//! Overlay Integration Tests
//!
//! Tests the path from pointer input to bus events:
//! - Drag and resize gestures on an overlay
//! - Events published on a shared bus
//! - Coordinate conversion of gesture results back into document space

use std::sync::{Arc, Mutex};

use sign_core::{
    clamp_to_page, screen_to_doc, EventBus, EventKind, Field, FieldKind, FieldOverlay, PageSize,
    Point, Rect, ViewerConfig, ViewerEvent,
};

const LETTER: PageSize = PageSize::new(612.0, 792.0);

fn overlay_at_scale(scale: f64, fields: &[Field]) -> FieldOverlay {
    let mut overlay = FieldOverlay::new(0, &ViewerConfig::default());
    overlay.set_scale(scale);
    overlay.set_fields(fields);
    overlay.set_page_size(LETTER);
    overlay
}

fn recorded(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<ViewerEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on(kind, move |event| {
        sink.lock().expect("lock").push(event.clone());
        Ok(())
    });
    seen
}

// ============================================================================
// Drag Tests
// ============================================================================

#[test]
fn test_drag_publishes_drag_end_with_final_positions() {
    let field = Field::new(0, Rect::new(100.0, 100.0, 80.0, 40.0), FieldKind::Text, "x")
        .with_id("f");
    let mut overlay = overlay_at_scale(1.0, &[field]);
    let bus = EventBus::new();
    let drags = recorded(&bus, EventKind::DragEnd);

    let origin = Point::new(20.0, 20.0);
    // Field body centre in client space: page origin + (140, 672).
    let start = Point::new(160.0, 692.0);
    assert!(overlay.pointer_down(start, origin));
    overlay.pointer_move(Point::new(180.0, 652.0));
    for event in overlay.pointer_up(Point::new(210.0, 642.0)) {
        bus.emit(&event);
    }

    let drags = drags.lock().expect("lock");
    match drags.as_slice() {
        [ViewerEvent::DragEnd(end)] => {
            assert_eq!(end.field_id.as_str(), "f");
            assert_eq!(end.source_page, 0);
            assert_eq!(end.pointer, Point::new(210.0, 642.0));
            // Element started at client (120, 672) and moved (50, -50).
            assert_eq!(end.element_origin, Point::new(170.0, 622.0));
        }
        other => panic!("expected one drag end, got {other:?}"),
    }
}

#[test]
fn test_press_without_movement_publishes_nothing() {
    let field = Field::new(0, Rect::new(100.0, 100.0, 80.0, 40.0), FieldKind::Text, "x");
    let mut overlay = overlay_at_scale(1.0, &[field]);
    let origin = Point::new(0.0, 0.0);
    let body = Point::new(140.0, 672.0);

    overlay.pointer_down(body, origin);
    overlay.pointer_move(Point::new(141.0, 673.0));
    assert!(overlay.pointer_up(Point::new(141.0, 673.0)).is_empty());
}

// ============================================================================
// Resize Tests
// ============================================================================

#[test]
fn test_resize_result_maps_back_to_document_space() {
    let field = Field::new(0, Rect::new(100.0, 100.0, 80.0, 40.0), FieldKind::Image, "data:")
        .with_id("f");
    let mut overlay = overlay_at_scale(2.0, &[field]);
    overlay.select(&"f".into());

    // At scale 2 the field occupies (200, 1304, 160, 80); drag the se corner.
    let origin = Point::new(0.0, 0.0);
    assert!(overlay.pointer_down(Point::new(360.0, 1384.0), origin));
    let events = overlay.pointer_up(Point::new(400.0, 1404.0));

    let end = match events.as_slice() {
        [ViewerEvent::ResizeEnd(end)] => end.clone(),
        other => panic!("expected resize end, got {other:?}"),
    };
    assert_eq!(end.rect, Rect::new(200.0, 1304.0, 200.0, 100.0));

    let doc = clamp_to_page(screen_to_doc(end.rect, LETTER.height, 2.0), LETTER);
    // The top edge stays fixed, so the document y moves down by the growth.
    assert!(doc.approx_eq(&Rect::new(100.0, 90.0, 100.0, 50.0), 1e-9));
}

#[test]
fn test_second_field_cannot_start_gesture_mid_drag() {
    let a = Field::new(0, Rect::new(10.0, 10.0, 50.0, 50.0), FieldKind::Text, "a").with_id("a");
    let b = Field::new(0, Rect::new(300.0, 300.0, 50.0, 50.0), FieldKind::Text, "b").with_id("b");
    let mut overlay = overlay_at_scale(1.0, &[a, b]);
    let origin = Point::new(0.0, 0.0);

    // a: screen (10, 732, 50, 50); b: screen (300, 442, 50, 50)
    assert!(overlay.pointer_down(Point::new(30.0, 750.0), origin));
    assert!(!overlay.pointer_down(Point::new(320.0, 460.0), origin));
    assert_eq!(
        overlay.interaction().active_field().map(sign_core::FieldId::as_str),
        Some("a")
    );
}
