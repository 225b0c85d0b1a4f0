//! # Page Surface
//!
//! One materialised page: its raster, its field overlay and the bookkeeping
//! that keeps renders from overlapping.
//!
//! Renders come in two tiers. A preview render runs immediately during zoom at
//! reduced pixel density; a full render runs once zooming settles. Starting a
//! render aborts whatever render is still in flight for the surface, and a
//! render lock guarantees two draws never touch the surface at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{AbortHandle, Abortable, Aborted};
use sign_core::{
    EventBus, Field, FieldOverlay, GestureUpdate, PageSize, Point, ViewerConfig, ViewerEvent,
};

use crate::error::{RenderError, RenderResult};
use crate::rasterizer::{PageHandle, RasterSurface};

/// Raster quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderQuality {
    /// Reduced density, shown while zooming.
    Preview,
    /// Full density including the device pixel ratio.
    Full,
}

/// State of a surface's raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStatus {
    /// Nothing drawn yet.
    Pending,
    /// A render is in flight.
    Rendering,
    /// The raster holds a completed render.
    Ready(RenderQuality),
    /// The last render failed.
    Failed,
}

struct SurfaceState {
    page_size: Option<PageSize>,
    scale: f64,
    status: RasterStatus,
    raster: Option<RasterSurface>,
    page: Option<Arc<dyn PageHandle>>,
    overlay: FieldOverlay,
    in_flight: Option<AbortHandle>,
    render_seq: u64,
    destroyed: bool,
}

/// A page surface, shared between the strategy and its render tasks.
pub struct PageSurface {
    index: usize,
    preview_quality: f64,
    device_pixel_ratio: f64,
    bus: EventBus,
    state: Mutex<SurfaceState>,
    render_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for PageSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("PageSurface")
            .field("index", &self.index)
            .field("page_size", &state.page_size)
            .field("scale", &state.scale)
            .field("status", &state.status)
            .field("destroyed", &state.destroyed)
            .finish_non_exhaustive()
    }
}

impl PageSurface {
    /// Create a surface for a page (0-based). Dimensions are unknown until
    /// [`Self::set_page_dimensions`] or [`Self::attach_page`].
    #[must_use]
    pub fn new(index: usize, config: &ViewerConfig, bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            index,
            preview_quality: config.preview_quality,
            device_pixel_ratio: config.device_pixel_ratio,
            bus,
            state: Mutex::new(SurfaceState {
                page_size: None,
                scale: config.initial_scale,
                status: RasterStatus::Pending,
                raster: None,
                page: None,
                overlay: FieldOverlay::new(index, config),
                in_flight: None,
                render_seq: 0,
                destroyed: false,
            }),
            render_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Page index (0-based).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Unscaled page size, once known.
    #[must_use]
    pub fn page_size(&self) -> Option<PageSize> {
        self.lock().page_size
    }

    /// Current display scale.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.lock().scale
    }

    /// Scaled display size, once the page size is known.
    #[must_use]
    pub fn display_size(&self) -> Option<PageSize> {
        let state = self.lock();
        state.page_size.map(|size| size.scaled(state.scale))
    }

    /// Raster status.
    #[must_use]
    pub fn status(&self) -> RasterStatus {
        self.lock().status
    }

    /// Pixel size of the last completed render.
    #[must_use]
    pub fn raster_size(&self) -> Option<(u32, u32)> {
        self.lock()
            .raster
            .as_ref()
            .map(|raster| (raster.pixel_width, raster.pixel_height))
    }

    /// Whether a page handle has been attached.
    #[must_use]
    pub fn has_page(&self) -> bool {
        self.lock().page.is_some()
    }

    /// Whether the surface was destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Record page size and display scale.
    ///
    /// Repeating a call with the same values changes nothing; the raster and
    /// its status are never reset. Returns whether anything changed.
    pub fn set_page_dimensions(&self, width: f64, height: f64, scale: f64) -> bool {
        let mut state = self.lock();
        if state.destroyed {
            return false;
        }
        let size = PageSize::new(width, height);
        let mut changed = false;
        if (state.scale - scale).abs() > f64::EPSILON {
            state.scale = scale;
            state.overlay.set_scale(scale);
            changed = true;
        }
        if state.page_size != Some(size) {
            state.page_size = Some(size);
            state.overlay.set_page_size(size);
            changed = true;
        }
        changed
    }

    /// Attach the resolved page handle; dimensions are taken from its
    /// natural viewport.
    pub fn attach_page(&self, page: Arc<dyn PageHandle>) {
        let natural = page.viewport(1.0);
        let scale = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.page = Some(page);
            state.scale
        };
        self.set_page_dimensions(natural.width, natural.height, scale);
    }

    /// Render the page at `scale`.
    ///
    /// A newer render aborts this one; cancellation resolves to `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the rasterizer's error for genuine failures, or
    /// [`RenderError::PageNotFound`] if no page handle is attached yet.
    pub async fn render(&self, scale: f64, quality: RenderQuality) -> RenderResult<()> {
        let (handle, registration) = AbortHandle::new_pair();
        let (page, seq) = {
            let mut state = self.lock();
            if state.destroyed {
                return Ok(());
            }
            let Some(page) = state.page.clone() else {
                return Err(RenderError::PageNotFound(self.index));
            };
            if let Some(previous) = state.in_flight.replace(handle) {
                previous.abort();
            }
            state.render_seq += 1;
            state.status = RasterStatus::Rendering;
            (page, state.render_seq)
        };

        let render_scale = match quality {
            RenderQuality::Preview => scale * self.preview_quality,
            RenderQuality::Full => scale * self.device_pixel_ratio,
        };

        let draw = async {
            let _guard = self.render_lock.lock().await;
            if self.is_destroyed() {
                return Err(RenderError::Cancelled);
            }
            let viewport = page.viewport(render_scale);
            let mut target = RasterSurface::for_viewport(&viewport);
            page.render(&mut target, viewport).await?;
            Ok(target)
        };

        let result = Abortable::new(draw, registration).await;

        let mut state = self.lock();
        let current = state.render_seq == seq && !state.destroyed;
        if current {
            state.in_flight = None;
        }
        match result {
            Err(Aborted) | Ok(Err(RenderError::Cancelled)) => {
                tracing::debug!(page = self.index, "Render cancelled");
                Ok(())
            }
            Ok(Err(e)) => {
                if current {
                    state.status = RasterStatus::Failed;
                }
                Err(e)
            }
            Ok(Ok(target)) => {
                if current {
                    state.raster = Some(target);
                    state.status = RasterStatus::Ready(quality);
                }
                Ok(())
            }
        }
    }

    /// Abort any render, drop the raster and ignore all later work.
    pub fn destroy(&self) {
        let mut state = self.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.abort();
        }
        state.page = None;
        state.raster = None;
        state.overlay.cancel_gesture();
        tracing::debug!(page = self.index, "Surface destroyed");
    }

    /// Read the overlay.
    pub fn with_overlay<R>(&self, f: impl FnOnce(&FieldOverlay) -> R) -> R {
        f(&self.lock().overlay)
    }

    /// Mutate the overlay.
    pub fn with_overlay_mut<R>(&self, f: impl FnOnce(&mut FieldOverlay) -> R) -> R {
        f(&mut self.lock().overlay)
    }

    /// Show the fields belonging to this page.
    pub fn set_fields(&self, fields: &[Field]) {
        let mut state = self.lock();
        if !state.destroyed {
            state.overlay.set_fields(fields);
        }
    }

    /// Whether a point in client space hits something on this overlay.
    #[must_use]
    pub fn hits(&self, pointer: Point, page_origin: Point) -> bool {
        let local = Point::new(pointer.x - page_origin.x, pointer.y - page_origin.y);
        !matches!(
            self.lock().overlay.hit_test(local),
            sign_core::HitTarget::Empty
        )
    }

    /// Route a press to the overlay. Returns whether a gesture started.
    pub fn pointer_down(&self, pointer: Point, page_origin: Point) -> bool {
        let mut state = self.lock();
        !state.destroyed && state.overlay.pointer_down(pointer, page_origin)
    }

    /// Route movement to the overlay.
    pub fn pointer_move(&self, pointer: Point) -> Option<GestureUpdate> {
        let mut state = self.lock();
        if state.destroyed {
            return None;
        }
        state.overlay.pointer_move(pointer)
    }

    /// Route a release to the overlay and publish what it produced.
    pub fn pointer_up(&self, pointer: Point) {
        let events: Vec<ViewerEvent> = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.overlay.pointer_up(pointer)
        };
        for event in &events {
            self.bus.emit(event);
        }
    }

    /// Update hover state from a client-space pointer position.
    pub fn update_hover(&self, pointer: Point, page_origin: Point) {
        let local = Point::new(pointer.x - page_origin.x, pointer.y - page_origin.y);
        let mut state = self.lock();
        if !state.destroyed {
            state.overlay.update_hover(local);
        }
    }

    /// Abandon any gesture on the overlay.
    pub fn cancel_gesture(&self) {
        self.lock().overlay.cancel_gesture();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRasterizer;
    use crate::rasterizer::{DocumentSource, Rasterizer};
    use std::time::Duration;

    async fn page(rasterizer: &MemoryRasterizer) -> Arc<dyn PageHandle> {
        let doc = rasterizer
            .load_document(DocumentSource::Bytes(br#"{"pages":[[612,792]]}"#.to_vec()))
            .await
            .expect("should load");
        doc.page(0).await.expect("page 0")
    }

    #[test]
    fn test_set_page_dimensions_is_idempotent() {
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        assert!(surface.set_page_dimensions(612.0, 792.0, 1.0));
        assert!(!surface.set_page_dimensions(612.0, 792.0, 1.0));
        assert_eq!(surface.display_size(), Some(PageSize::new(612.0, 792.0)));
        assert_eq!(surface.status(), RasterStatus::Pending);
    }

    #[test]
    fn test_repeated_dimensions_keep_overlay_positions() {
        use sign_core::{FieldKind, Rect};

        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        surface.set_fields(&[Field::new(
            0,
            Rect::new(100.0, 100.0, 80.0, 40.0),
            FieldKind::Signature,
            "<svg/>",
        )]);
        assert!(surface.set_page_dimensions(612.0, 792.0, 1.5));
        let first = surface.with_overlay(|overlay| overlay.visuals().to_vec());
        assert_eq!(first.len(), 1);
        assert!(!first[0].hidden);
        // (100, 792 - 100 - 40) * 1.5
        assert_eq!(first[0].outer, Rect::new(150.0, 978.0, 120.0, 60.0));

        assert!(!surface.set_page_dimensions(612.0, 792.0, 1.5));
        let second = surface.with_overlay(|overlay| overlay.visuals().to_vec());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_render_without_page_fails() {
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        let result = surface.render(1.0, RenderQuality::Full).await;
        assert!(matches!(result, Err(RenderError::PageNotFound(0))));
    }

    #[tokio::test]
    async fn test_preview_uses_reduced_density() {
        let rasterizer = MemoryRasterizer::new();
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        surface.attach_page(page(&rasterizer).await);

        surface
            .render(2.0, RenderQuality::Preview)
            .await
            .expect("should render");
        assert_eq!(surface.status(), RasterStatus::Ready(RenderQuality::Preview));
        assert_eq!(surface.raster_size(), Some((612, 792)));

        surface
            .render(2.0, RenderQuality::Full)
            .await
            .expect("should render");
        assert_eq!(surface.raster_size(), Some((1224, 1584)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_render_cancels_older() {
        let rasterizer = MemoryRasterizer::new().with_render_delay(Duration::from_millis(50));
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        surface.attach_page(page(&rasterizer).await);

        let first = {
            let surface = Arc::clone(&surface);
            tokio::spawn(async move { surface.render(1.0, RenderQuality::Full).await })
        };
        tokio::task::yield_now().await;
        let second = surface.render(3.0, RenderQuality::Full).await;

        assert!(second.is_ok());
        assert!(first.await.expect("task").is_ok());
        assert_eq!(rasterizer.completed_renders(), 1);
        assert_eq!(surface.raster_size(), Some((1836, 2376)));
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let rasterizer = MemoryRasterizer::new().with_failing_page(0);
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        surface.attach_page(page(&rasterizer).await);

        let result = surface.render(1.0, RenderQuality::Full).await;
        assert!(matches!(result, Err(RenderError::Failed(_))));
        assert_eq!(surface.status(), RasterStatus::Failed);
    }

    #[tokio::test]
    async fn test_destroyed_surface_ignores_work() {
        let rasterizer = MemoryRasterizer::new();
        let surface = PageSurface::new(0, &ViewerConfig::default(), EventBus::new());
        surface.attach_page(page(&rasterizer).await);
        surface.destroy();
        surface.destroy();

        assert!(surface.render(1.0, RenderQuality::Full).await.is_ok());
        assert!(!surface.set_page_dimensions(100.0, 100.0, 1.0));
        assert_eq!(rasterizer.completed_renders(), 0);
    }
}
