//! Continuous scroll mode: every page in one vertical flow.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use sign_core::{
    EventBus, EventKind, Field, PageSize, Point, Rect, SubscriptionId, ViewMode, ViewerConfig,
    ViewerEvent,
};

use super::{
    schedule_full_render, spawn_render, StrategyContext, ViewModeStrategy, ZoomDebouncer,
};
use crate::error::ViewerResult;
use crate::layout::PageLayout;
use crate::surface::{PageSurface, RenderQuality};

#[derive(Default)]
struct ScrollState {
    pages: Vec<PageSize>,
    surfaces: Vec<Arc<PageSurface>>,
    layout: PageLayout,
    scale: f64,
    current_page: usize,
    scroll_top: f64,
    viewport_width: f64,
    viewport_height: f64,
    subscription: Option<SubscriptionId>,
    destroyed: bool,
}

struct ScrollShared {
    bus: EventBus,
    config: ViewerConfig,
    debouncer: Arc<ZoomDebouncer>,
    state: Mutex<ScrollState>,
}

impl ScrollShared {
    fn lock(&self) -> MutexGuard<'_, ScrollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn relayout(&self, state: &mut ScrollState) {
        state.layout = PageLayout::compute(
            &state.pages,
            state.scale,
            state.viewport_width,
            self.config.page_gap_px,
            self.config.page_padding_px,
        );
    }

    /// Re-evaluate the current page; returns the event to emit if it changed.
    fn track_visibility(&self, state: &mut ScrollState) -> Option<ViewerEvent> {
        let index = state.layout.most_visible(
            state.scroll_top,
            state.viewport_height,
            self.config.visibility_threshold,
        )?;
        let page = index + 1;
        if page == state.current_page {
            return None;
        }
        state.current_page = page;
        Some(ViewerEvent::PageChange {
            page,
            total: state.pages.len(),
        })
    }

    fn apply_fields(&self, fields: &[Field]) {
        let surfaces = {
            let state = self.lock();
            if state.destroyed {
                return;
            }
            state.surfaces.clone()
        };
        for surface in surfaces {
            surface.set_fields(fields);
        }
    }
}

/// All pages stacked vertically with scroll-anchored zoom.
pub struct ScrollStrategy {
    shared: Arc<ScrollShared>,
}

impl ScrollStrategy {
    /// Create an uninitialised scroll strategy.
    #[must_use]
    pub fn new(bus: EventBus, config: ViewerConfig) -> Self {
        let debouncer = Arc::new(ZoomDebouncer::new(&config));
        let state = ScrollState {
            scale: config.initial_scale,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            ..ScrollState::default()
        };
        Self {
            shared: Arc::new(ScrollShared {
                bus,
                config,
                debouncer,
                state: Mutex::new(state),
            }),
        }
    }

    fn client_to_content(&self, client: Point) -> Point {
        let scroll_top = self.shared.lock().scroll_top;
        Point::new(client.x, client.y + scroll_top)
    }
}

#[async_trait]
impl ViewModeStrategy for ScrollStrategy {
    fn mode(&self) -> ViewMode {
        ViewMode::Scroll
    }

    async fn init(&self, ctx: StrategyContext) -> ViewerResult<()> {
        let shared = &self.shared;
        let scale = shared.config.clamp_scale(ctx.scale);

        // Page structure first, synchronously, from the geometry cache.
        let surfaces = {
            let mut state = shared.lock();
            if state.destroyed {
                return Ok(());
            }
            state.pages.clone_from(&ctx.pages);
            state.scale = scale;
            state.viewport_width = ctx.viewport_width;
            state.viewport_height = ctx.viewport_height;
            state.surfaces = ctx
                .pages
                .iter()
                .enumerate()
                .map(|(index, size)| {
                    let surface = PageSurface::new(index, &shared.config, shared.bus.clone());
                    surface.set_page_dimensions(size.width, size.height, scale);
                    surface.set_fields(&ctx.fields);
                    surface
                })
                .collect();
            shared.relayout(&mut state);
            state.current_page = usize::from(!ctx.pages.is_empty());

            let weak: Weak<ScrollShared> = Arc::downgrade(shared);
            state.subscription = Some(shared.bus.on(EventKind::FieldsChange, move |event| {
                if let (Some(shared), ViewerEvent::FieldsChange(fields)) = (weak.upgrade(), event) {
                    shared.apply_fields(fields);
                }
                Ok(())
            }));
            state.surfaces.clone()
        };

        for surface in &surfaces {
            let page = ctx.document.page(surface.index()).await?;
            if shared.lock().destroyed {
                return Ok(());
            }
            surface.attach_page(page);
        }

        // Position on the initial page without emitting; init announces it once.
        let (page, total) = {
            let mut state = shared.lock();
            let total = state.pages.len();
            if (2..=total).contains(&ctx.initial_page) {
                if let Some(slot) = state.layout.slot(ctx.initial_page - 1) {
                    state.scroll_top = state.layout.clamp_scroll(slot.y, state.viewport_height);
                }
                state.current_page = ctx.initial_page;
            }
            (state.current_page, total)
        };
        shared.bus.emit(&ViewerEvent::PageChange { page, total });
        tracing::debug!("Scroll view initialised with {total} pages at scale {scale}");

        for surface in surfaces {
            spawn_render(surface, shared.bus.clone(), scale, RenderQuality::Full);
        }
        Ok(())
    }

    fn destroy(&self) {
        let shared = &self.shared;
        let (surfaces, subscription) = {
            let mut state = shared.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            (std::mem::take(&mut state.surfaces), state.subscription.take())
        };
        shared.debouncer.bump();
        if let Some(id) = subscription {
            shared.bus.off(EventKind::FieldsChange, id);
        }
        for surface in surfaces {
            surface.destroy();
        }
    }

    fn set_scale(&self, scale: f64) {
        let shared = &self.shared;
        let scale = shared.config.clamp_scale(scale);
        let (surfaces, page_event) = {
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
                None => state
                    .layout
                    .clamp_scroll(state.scroll_top, state.viewport_height),
            };
            for (surface, size) in state.surfaces.iter().zip(&state.pages) {
                surface.set_page_dimensions(size.width, size.height, scale);
            }
            let page_event = shared.track_visibility(&mut state);
            (state.surfaces.clone(), page_event)
        };

        shared.bus.emit(&ViewerEvent::ScaleChange { scale });
        if let Some(event) = page_event {
            shared.bus.emit(&event);
        }

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
        let event = {
            let mut state = shared.lock();
            let total = state.pages.len();
            if state.destroyed || page < 1 || page > total {
                return;
            }
            if let Some(slot) = state.layout.slot(page - 1) {
                state.scroll_top = state.layout.clamp_scroll(slot.y, state.viewport_height);
            }
            if state.current_page == page {
                None
            } else {
                state.current_page = page;
                Some(ViewerEvent::PageChange { page, total })
            }
        };
        if let Some(event) = event {
            shared.bus.emit(&event);
        }
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
        let event = {
            let mut state = shared.lock();
            if state.destroyed {
                return;
            }
            state.viewport_width = width;
            state.viewport_height = height;
            shared.relayout(&mut state);
            state.scroll_top = state.layout.clamp_scroll(state.scroll_top, height);
            shared.track_visibility(&mut state)
        };
        if let Some(event) = event {
            shared.bus.emit(&event);
        }
    }

    fn scroll_to(&self, top: f64) {
        let shared = &self.shared;
        let event = {
            let mut state = shared.lock();
            if state.destroyed {
                return;
            }
            state.scroll_top = state.layout.clamp_scroll(top, state.viewport_height);
            shared.track_visibility(&mut state)
        };
        if let Some(event) = event {
            shared.bus.emit(&event);
        }
    }

    fn scroll_top(&self) -> f64 {
        self.shared.lock().scroll_top
    }

    fn page_at(&self, client: Point) -> Option<usize> {
        let point = self.client_to_content(client);
        self.shared.lock().layout.slot_at(point)
    }

    fn nearest_page(&self, client: Point) -> Option<usize> {
        let point = self.client_to_content(client);
        self.shared.lock().layout.nearest_slot(point)
    }

    fn page_client_rect(&self, index: usize) -> Option<Rect> {
        let state = self.shared.lock();
        state
            .layout
            .slot(index)
            .map(|slot| slot.translate(0.0, -state.scroll_top))
    }

    fn surface(&self, index: usize) -> Option<Arc<PageSurface>> {
        self.shared.lock().surfaces.get(index).cloned()
    }

    fn surfaces(&self) -> Vec<Arc<PageSurface>> {
        self.shared.lock().surfaces.clone()
    }
}

impl Drop for ScrollStrategy {
    fn drop(&mut self) {
        self.destroy();
    }
}
