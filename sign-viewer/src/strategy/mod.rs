//! View-mode strategies.
//!
//! A strategy owns the page surfaces for one way of presenting a document
//! and everything that depends on it: navigation, zoom, scrolling and
//! visible-page tracking. The controller talks to whichever strategy is
//! active through [`ViewModeStrategy`] and swaps them by destroying the old
//! one and initialising the new one against the same document and fields.

mod scroll;
mod single;

pub use scroll::ScrollStrategy;
pub use single::SinglePageStrategy;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sign_core::{EventBus, Field, PageSize, Point, Rect, ViewMode, ViewerConfig, ViewerEvent};

use crate::error::ViewerResult;
use crate::rasterizer::DocumentHandle;
use crate::surface::{PageSurface, RenderQuality};

/// Everything a strategy needs to initialise.
#[derive(Clone)]
pub struct StrategyContext {
    /// Opened document.
    pub document: Arc<dyn DocumentHandle>,
    /// Unscaled size of every page.
    pub pages: Vec<PageSize>,
    /// Field snapshot to show initially.
    pub fields: Vec<Field>,
    /// Scale to start at (clamped by the strategy).
    pub scale: f64,
    /// Page to start on (1-based).
    pub initial_page: usize,
    /// Viewport width in pixels.
    pub viewport_width: f64,
    /// Viewport height in pixels.
    pub viewport_height: f64,
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContext")
            .field("pages", &self.pages.len())
            .field("fields", &self.fields.len())
            .field("scale", &self.scale)
            .field("initial_page", &self.initial_page)
            .finish_non_exhaustive()
    }
}

/// Shared command surface of the view modes.
///
/// Page numbers are 1-based; page indices are 0-based. Client coordinates
/// are relative to the viewer container's top-left corner.
#[async_trait]
pub trait ViewModeStrategy: Send + Sync {
    /// Which mode this is.
    fn mode(&self) -> ViewMode;

    /// Build the page structure and start rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if page handles cannot be resolved.
    async fn init(&self, ctx: StrategyContext) -> ViewerResult<()>;

    /// Tear down surfaces, timers and subscriptions. Idempotent.
    fn destroy(&self);

    /// Zoom, keeping the viewport centre anchored.
    fn set_scale(&self, scale: f64);

    /// Current scale.
    fn scale(&self) -> f64;

    /// Navigate to a page (1-based). Out-of-range numbers are ignored.
    fn go_to_page(&self, page: usize);

    /// Navigate to the next page.
    fn next_page(&self) {
        self.go_to_page(self.current_page() + 1);
    }

    /// Navigate to the previous page.
    fn previous_page(&self) {
        let current = self.current_page();
        if current > 1 {
            self.go_to_page(current - 1);
        }
    }

    /// Current page (1-based, 0 before init).
    fn current_page(&self) -> usize;

    /// Number of pages.
    fn total_pages(&self) -> usize;

    /// Replace the fields shown on the surfaces.
    fn set_fields(&self, fields: &[Field]);

    /// Resize the viewport.
    fn set_viewport(&self, width: f64, height: f64);

    /// Scroll to a content offset.
    fn scroll_to(&self, top: f64);

    /// Current scroll offset.
    fn scroll_top(&self) -> f64;

    /// Page under a client point.
    fn page_at(&self, client: Point) -> Option<usize>;

    /// Page nearest a client point. Ties go to the earlier page.
    fn nearest_page(&self, client: Point) -> Option<usize>;

    /// Client rect of a materialised page.
    fn page_client_rect(&self, index: usize) -> Option<Rect>;

    /// Surface of a materialised page.
    fn surface(&self, index: usize) -> Option<Arc<PageSurface>>;

    /// All materialised surfaces.
    fn surfaces(&self) -> Vec<Arc<PageSurface>>;
}

/// Generation counter for the zoom debounce.
///
/// Every zoom bumps the generation; a pending full-quality render only runs
/// if no newer zoom arrived while it waited.
#[derive(Debug)]
pub(crate) struct ZoomDebouncer {
    generation: AtomicU64,
    delay: Duration,
}

impl ZoomDebouncer {
    pub(crate) fn new(config: &ViewerConfig) -> Self {
        Self {
            generation: AtomicU64::new(0),
            delay: Duration::from_millis(config.zoom_debounce_ms),
        }
    }

    /// Start a new quiet period and return its generation.
    pub(crate) fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}

/// Run a future on the ambient tokio runtime, if there is one.
pub(crate) fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::warn!("No async runtime available, skipping background render"),
    }
}

/// Render a surface in the background, reporting genuine failures on the bus.
pub(crate) fn spawn_render(
    surface: Arc<PageSurface>,
    bus: EventBus,
    scale: f64,
    quality: RenderQuality,
) {
    spawn_detached(async move {
        if let Err(e) = surface.render(scale, quality).await {
            tracing::warn!("Render of page {} failed: {e}", surface.index());
            bus.emit(&ViewerEvent::Error {
                message: e.to_string(),
            });
        }
    });
}

/// Resolve a surface's page handle, then render it at full quality.
pub(crate) fn spawn_attach_and_render(
    document: Arc<dyn DocumentHandle>,
    surface: Arc<PageSurface>,
    bus: EventBus,
    scale: f64,
) {
    spawn_detached(async move {
        match document.page(surface.index()).await {
            Ok(page) => {
                if surface.is_destroyed() {
                    return;
                }
                surface.attach_page(page);
                if let Err(e) = surface.render(scale, RenderQuality::Full).await {
                    tracing::warn!("Render of page {} failed: {e}", surface.index());
                    bus.emit(&ViewerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!("Failed to resolve page {}: {e}", surface.index());
                bus.emit(&ViewerEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    });
}

/// Wait out the debounce, then render every surface at full quality if no
/// newer zoom arrived.
pub(crate) fn schedule_full_render(
    debouncer: Arc<ZoomDebouncer>,
    surfaces: Vec<Arc<PageSurface>>,
    bus: EventBus,
    scale: f64,
) {
    let generation = debouncer.bump();
    spawn_detached(async move {
        tokio::time::sleep(debouncer.delay()).await;
        if !debouncer.is_current(generation) {
            return;
        }
        for surface in surfaces {
            if !surface.is_destroyed() && surface.has_page() {
                spawn_render(surface, bus.clone(), scale, RenderQuality::Full);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_tracks_latest_generation() {
        let debouncer = ZoomDebouncer::new(&ViewerConfig::default());
        let first = debouncer.bump();
        let second = debouncer.bump();
        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
        assert_eq!(debouncer.delay(), Duration::from_millis(150));
    }
}
