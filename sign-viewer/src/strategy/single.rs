//! Single page mode: exactly one page materialised at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use sign_core::{
    EventBus, EventKind, Field, PageSize, Point, Rect, SubscriptionId, ViewMode, ViewerConfig,
    ViewerEvent,
};

use super::{
    schedule_full_render, spawn_attach_and_render, spawn_render, StrategyContext,
    ViewModeStrategy, ZoomDebouncer,
};
use crate::error::ViewerResult;
use crate::layout::PageLayout;
use crate::rasterizer::DocumentHandle;
use crate::surface::{PageSurface, RenderQuality};

#[derive(Default)]
struct SingleState {
    document: Option<Arc<dyn DocumentHandle>>,
    pages: Vec<PageSize>,
    fields: Vec<Field>,
    surface: Option<Arc<PageSurface>>,
    layout: PageLayout,
    scale: f64,
    current_page: usize,
    scroll_top: f64,
    viewport_width: f64,
    viewport_height: f64,
    subscription: Option<SubscriptionId>,
    destroyed: bool,
}

struct SingleShared {
    bus: EventBus,
    config: ViewerConfig,
    debouncer: Arc<ZoomDebouncer>,
    state: Mutex<SingleState>,
}

impl SingleShared {
    fn lock(&self) -> MutexGuard<'_, SingleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn relayout(&self, state: &mut SingleState) {
        let shown: Vec<PageSize> = state
            .current_page
            .checked_sub(1)
            .and_then(|index| state.pages.get(index))
            .copied()
            .into_iter()
            .collect();
        state.layout = PageLayout::compute(
            &shown,
            state.scale,
            state.viewport_width,
            0.0,
            self.config.page_padding_px,
        );
    }

    /// Replace the materialised surface with one for `page` (1-based).
    ///
    /// Returns the new surface and the surface it replaced.
    fn materialise(
        &self,
        state: &mut SingleState,
        page: usize,
    ) -> (Arc<PageSurface>, Option<Arc<PageSurface>>) {
        let index = page - 1;
        let surface = PageSurface::new(index, &self.config, self.bus.clone());
        if let Some(size) = state.pages.get(index) {
            surface.set_page_dimensions(size.width, size.height, state.scale);
        }
        surface.set_fields(&state.fields);

        let previous = state.surface.replace(Arc::clone(&surface));
        state.current_page = page;
        state.scroll_top = 0.0;
        self.relayout(state);
        (surface, previous)
    }

    fn apply_fields(&self, fields: &[Field]) {
        let surface = {
            let mut state = self.lock();
            if state.destroyed {
                return;
            }
            state.fields = fields.to_vec();
            state.surface.clone()
        };
        if let Some(surface) = surface {
            surface.set_fields(fields);
        }
    }
}

/// One page at a time; switching pages recreates the surface.
pub struct SinglePageStrategy {
    shared: Arc<SingleShared>,
}

impl SinglePageStrategy {
    /// Create an uninitialised single page strategy.
    #[must_use]
    pub fn new(bus: EventBus, config: ViewerConfig) -> Self {
        let debouncer = Arc::new(ZoomDebouncer::new(&config));
        let state = SingleState {
            scale: config.initial_scale,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            ..SingleState::default()
        };
        Self {
            shared: Arc::new(SingleShared {
                bus,
                config,
                debouncer,
                state: Mutex::new(state),
            }),
        }
    }

    /// Index of the shown page if it lies under (or nearest) a client point.
    fn slot_index(&self, client: Point, nearest: bool) -> Option<usize> {
        let state = self.shared.lock();
        let point = Point::new(client.x, client.y + state.scroll_top);
        let slot = if nearest {
            state.layout.nearest_slot(point)
        } else {
            state.layout.slot_at(point)
        };
        slot.and_then(|_| state.current_page.checked_sub(1))
    }
}

#[async_trait]
impl ViewModeStrategy for SinglePageStrategy {
    fn mode(&self) -> ViewMode {
        ViewMode::Single
    }

    async fn init(&self, ctx: StrategyContext) -> ViewerResult<()> {
        let shared = &self.shared;
        let scale = shared.config.clamp_scale(ctx.scale);
        let total = ctx.pages.len();
        let page = ctx.initial_page.clamp(1, total.max(1));

        let surface = {
            let mut state = shared.lock();
            if state.destroyed || total == 0 {
                return Ok(());
            }
            state.document = Some(Arc::clone(&ctx.document));
            state.pages.clone_from(&ctx.pages);
            state.fields.clone_from(&ctx.fields);
            state.scale = scale;
            state.viewport_width = ctx.viewport_width;
            state.viewport_height = ctx.viewport_height;
            let (surface, previous) = shared.materialise(&mut state, page);
            if let Some(previous) = previous {
                previous.destroy();
            }

            let weak: Weak<SingleShared> = Arc::downgrade(shared);
            state.subscription = Some(shared.bus.on(EventKind::FieldsChange, move |event| {
                if let (Some(shared), ViewerEvent::FieldsChange(fields)) = (weak.upgrade(), event) {
                    shared.apply_fields(fields);
                }
                Ok(())
            }));
            surface
        };

        let handle = ctx.document.page(surface.index()).await?;
        if surface.is_destroyed() {
            return Ok(());
        }
        surface.attach_page(handle);

        shared.bus.emit(&ViewerEvent::PageChange { page, total });
        tracing::debug!("Single page view initialised on page {page} of {total}");
        spawn_render(surface, shared.bus.clone(), scale, RenderQuality::Full);
        Ok(())
    }

    fn destroy(&self) {
        let shared = &self.shared;
        let (surface, subscription) = {
            let mut state = shared.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.document = None;
            (state.surface.take(), state.subscription.take())
        };
        shared.debouncer.bump();
        if let Some(id) = subscription {
            shared.bus.off(EventKind::FieldsChange, id);
        }
        if let Some(surface) = surface {
            surface.destroy();
        }
    }

    fn set_scale(&self, scale: f64) {
        let shared = &self.shared;
        let scale = shared.config.clamp_scale(scale);
        let surface = {
            let mut state = shared.lock();
            if state.destroyed {
                return;
            }
            let anchor = state
                .layout
                .capture_anchor(state.scroll_top, state.viewport_height);
            state.scale = scale;
            shared.relayout(&mut state);
            state.scroll_top = match anchor {
                Some(anchor) => state.layout.restore_anchor(anchor, state.viewport_height),
                None => state.layout.clamp_scroll(state.scroll_top, state.viewport_height),
            };
            let size = state
                .current_page
                .checked_sub(1)
                .and_then(|index| state.pages.get(index))
                .copied();
            if let (Some(surface), Some(size)) = (&state.surface, size) {
                surface.set_page_dimensions(size.width, size.height, scale);
            }
            state.surface.clone()
        };

        shared.bus.emit(&ViewerEvent::ScaleChange { scale });

        let surfaces: Vec<Arc<PageSurface>> = surface.into_iter().collect();
        for surface in &surfaces {
            if surface.has_page() {
                spawn_render(
                    Arc::clone(surface),
                    shared.bus.clone(),
                    scale,
                    RenderQuality::Preview,
                );
            }
        }
        schedule_full_render(Arc::clone(&shared.debouncer), surfaces, shared.bus.clone(), scale);
    }

    fn scale(&self) -> f64 {
        self.shared.lock().scale
    }

    fn go_to_page(&self, page: usize) {
        let shared = &self.shared;
        let switched = {
            let mut state = shared.lock();
            let total = state.pages.len();
            if state.destroyed || page < 1 || page > total || page == state.current_page {
                return;
            }
            let Some(document) = state.document.clone() else {
                return;
            };
            let (surface, previous) = shared.materialise(&mut state, page);
            (surface, previous, document, total, state.scale)
        };
        let (surface, previous, document, total, scale) = switched;

        if let Some(previous) = previous {
            previous.destroy();
        }
        shared.bus.emit(&ViewerEvent::PageChange { page, total });
        spawn_attach_and_render(document, surface, shared.bus.clone(), scale);
    }

    fn current_page(&self) -> usize {
        self.shared.lock().current_page
    }

    fn total_pages(&self) -> usize {
        self.shared.lock().pages.len()
    }

    fn set_fields(&self, fields: &[Field]) {
        self.shared.apply_fields(fields);
    }

    fn set_viewport(&self, width: f64, height: f64) {
        let shared = &self.shared;
        let mut state = shared.lock();
        if state.destroyed {
            return;
        }
        state.viewport_width = width;
        state.viewport_height = height;
        shared.relayout(&mut state);
        state.scroll_top = state.layout.clamp_scroll(state.scroll_top, height);
    }

    fn scroll_to(&self, top: f64) {
        let mut state = self.shared.lock();
        if !state.destroyed {
            state.scroll_top = state.layout.clamp_scroll(top, state.viewport_height);
        }
    }

    fn scroll_top(&self) -> f64 {
        self.shared.lock().scroll_top
    }

    fn page_at(&self, client: Point) -> Option<usize> {
        self.slot_index(client, false)
    }

    fn nearest_page(&self, client: Point) -> Option<usize> {
        self.slot_index(client, true)
    }

    fn page_client_rect(&self, index: usize) -> Option<Rect> {
        let state = self.shared.lock();
        if state.current_page.checked_sub(1) != Some(index) {
            return None;
        }
        state
            .layout
            .slot(0)
            .map(|slot| slot.translate(0.0, -state.scroll_top))
    }

    fn surface(&self, index: usize) -> Option<Arc<PageSurface>> {
        self.shared
            .lock()
            .surface
            .as_ref()
            .filter(|surface| surface.index() == index)
            .cloned()
    }

    fn surfaces(&self) -> Vec<Arc<PageSurface>> {
        self.shared.lock().surface.iter().cloned().collect()
    }
}

impl Drop for SinglePageStrategy {
    fn drop(&mut self) {
        self.destroy();
    }
}
