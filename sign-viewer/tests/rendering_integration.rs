//! Rendering Integration Tests
//!
//! Two-tier rendering driven through the controller on a paused clock:
//! - Preview renders during zoom, full renders once zooming settles
//! - Page surfaces in single page mode
//! - Render failures reported on the bus

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sign_core::{EventKind, PageSize, ViewMode, ViewerConfig, ViewerEvent};
use sign_viewer::{
    DocumentController, DocumentSource, MemoryRasterizer, RasterStatus, RenderQuality,
};

const LETTER: PageSize = PageSize::new(612.0, 792.0);

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn loaded_with(rasterizer: MemoryRasterizer, pages: usize) -> DocumentController {
    let controller = DocumentController::new(Arc::new(rasterizer), ViewerConfig::default())
        .expect("controller");
    let source = MemoryRasterizer::describe(&vec![LETTER; pages]).expect("describe");
    controller
        .load(DocumentSource::from(source))
        .await
        .expect("load");
    settle().await;
    controller
}

// ============================================================================
// Zoom Debounce Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_zoom_shows_preview_then_full_quality() {
    let controller = loaded_with(MemoryRasterizer::new(), 1).await;
    let surface = controller.surface(0).expect("surface");
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Full));
    assert_eq!(surface.raster_size(), Some((612, 792)));

    controller.set_scale(2.0);
    settle().await;
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Preview));
    assert_eq!(surface.raster_size(), Some((612, 792)));

    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Preview));

    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Full));
    assert_eq!(surface.raster_size(), Some((1224, 1584)));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_zoom_renders_full_quality_once() {
    let rasterizer = MemoryRasterizer::new();
    let controller = loaded_with(rasterizer.clone(), 1).await;
    let surface = controller.surface(0).expect("surface");
    assert_eq!(rasterizer.completed_renders(), 1);

    controller.set_scale(1.5);
    settle().await;
    tokio::time::advance(Duration::from_millis(100)).await;
    controller.set_scale(2.0);
    settle().await;

    // The first quiet period ends here but a newer zoom superseded it.
    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Preview));

    tokio::time::advance(Duration::from_millis(60)).await;
    settle().await;
    assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Full));
    assert_eq!(surface.raster_size(), Some((1224, 1584)));
    // Initial full, two previews, one settled full.
    assert_eq!(rasterizer.completed_renders(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_device_pixel_ratio_applies_to_full_renders_only() {
    let config = ViewerConfig {
        device_pixel_ratio: 2.0,
        ..ViewerConfig::default()
    };
    let controller = DocumentController::new(Arc::new(MemoryRasterizer::new()), config)
        .expect("controller");
    let source = MemoryRasterizer::describe(&[LETTER]).expect("describe");
    controller
        .load(DocumentSource::from(source))
        .await
        .expect("load");
    settle().await;

    let surface = controller.surface(0).expect("surface");
    assert_eq!(surface.raster_size(), Some((1224, 1584)));

    controller.set_scale(1.2);
    settle().await;
    // Preview: 1.2 * 0.5, no device pixel ratio.
    assert_eq!(surface.raster_size(), Some((368, 476)));
}

// ============================================================================
// Single Page Mode Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_mode_recreates_surface_per_page() {
    let controller = loaded_with(MemoryRasterizer::new(), 3).await;
    controller
        .set_view_mode(ViewMode::Single)
        .await
        .expect("single");
    settle().await;

    let first = controller.surface(0).expect("page 1 surface");
    assert!(controller.surface(1).is_none());

    controller.go_to_page(2);
    settle().await;

    assert!(first.is_destroyed());
    assert!(controller.surface(0).is_none());
    let second = controller.surface(1).expect("page 2 surface");
    assert_eq!(second.status(), RasterStatus::Ready(RenderQuality::Full));
    assert_eq!(controller.current_page(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_single_mode_scrolls_within_the_shown_page() {
    let controller = loaded_with(MemoryRasterizer::new(), 3).await;
    controller
        .set_view_mode(ViewMode::Single)
        .await
        .expect("single");
    controller.go_to_page(3);
    settle().await;

    let surface = controller.surface(2).expect("surface");
    assert_eq!(surface.display_size(), Some(LETTER));

    // One page plus padding: 20 + 792 + 20 against a 600px viewport.
    controller.scroll_to(1000.0);
    assert!((controller.scroll_top() - 232.0).abs() < 1e-9);

    controller.previous_page();
    assert!(controller.scroll_top().abs() < f64::EPSILON);
    assert_eq!(controller.current_page(), 2);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_render_failure_is_reported_on_bus() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let controller = DocumentController::new(
        Arc::new(MemoryRasterizer::new().with_failing_page(1)),
        ViewerConfig::default(),
    )
    .expect("controller");
    let sink = Arc::clone(&errors);
    controller.on(EventKind::Error, move |event| {
        sink.lock().expect("lock").push(event.clone());
        Ok(())
    });

    let source = MemoryRasterizer::describe(&[LETTER; 2]).expect("describe");
    controller
        .load(DocumentSource::from(source))
        .await
        .expect("load");
    settle().await;

    assert_eq!(
        controller.surface(0).expect("surface").status(),
        RasterStatus::Ready(RenderQuality::Full)
    );
    assert_eq!(
        controller.surface(1).expect("surface").status(),
        RasterStatus::Failed
    );
    let errors = errors.lock().expect("lock");
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], ViewerEvent::Error { message } if message.contains("failed")));
}
