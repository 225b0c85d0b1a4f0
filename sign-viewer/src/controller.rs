//! # Document Controller
//!
//! Single owner of the field list and the public face of the viewer. It
//! loads documents, keeps the page geometry cache, swaps view-mode
//! strategies, routes host input and turns gesture results from the bus into
//! model mutations.
//!
//! Every mutation emits its specific event followed by one `FieldsChange`
//! snapshot. No lock is held while emitting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use sign_core::{
    clamp_to_page, screen_to_doc, DragEnd, EventBus, EventKind, Field, FieldId, FieldPatch,
    HandlerResult, PageSize, PointerEvent, PointerPhase, ResizeEnd, SignError, SubscriptionId,
    ViewMode, ViewerConfig, ViewerEvent, ZoomGesture, ZoomInput,
};

use crate::error::{ViewerError, ViewerResult};
use crate::print::{PrintJob, PrintOptions, PrintPipeline};
use crate::rasterizer::{DocumentHandle, DocumentSource, Rasterizer};
use crate::strategy::{ScrollStrategy, SinglePageStrategy, StrategyContext, ViewModeStrategy};
use crate::surface::PageSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unloaded,
    Loading,
    Ready,
}

struct ControllerState {
    load: LoadState,
    load_seq: u64,
    document: Option<Arc<dyn DocumentHandle>>,
    source: Option<DocumentSource>,
    pages: Vec<PageSize>,
    fields: Vec<Field>,
    strategy: Option<Arc<dyn ViewModeStrategy>>,
    mode: ViewMode,
    scale: f64,
    viewport_width: f64,
    viewport_height: f64,
    zoom: ZoomGesture,
    pointer_page: Option<usize>,
    print: Option<Arc<dyn PrintPipeline>>,
}

struct Inner {
    config: ViewerConfig,
    bus: EventBus,
    rasterizer: Arc<dyn Rasterizer>,
    state: Mutex<ControllerState>,
    subscriptions: Mutex<Vec<(EventKind, SubscriptionId)>>,
    destroyed: AtomicBool,
    strategy_seq: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn strategy(&self) -> Option<Arc<dyn ViewModeStrategy>> {
        self.lock().strategy.clone()
    }

    fn emit_all(&self, events: &[ViewerEvent]) {
        for event in events {
            self.bus.emit(event);
        }
    }

    fn add_field(&self, mut field: Field) -> ViewerResult<Field> {
        if self.is_destroyed() {
            return Err(ViewerError::Destroyed);
        }
        let snapshot = {
            let mut state = self.lock();
            match state.load {
                LoadState::Unloaded => return Err(SignError::NotLoaded.into()),
                LoadState::Loading => return Err(SignError::NotReady.into()),
                LoadState::Ready => {}
            }
            if field.id.is_empty() {
                field.id = FieldId::new();
            }
            if state.fields.iter().any(|existing| existing.id == field.id) {
                return Err(SignError::DuplicateField(field.id).into());
            }
            field.validate(&state.pages)?;
            state.fields.push(field.clone());
            state.fields.clone()
        };
        tracing::debug!("Added field {} on page {}", field.id, field.page_index);
        self.emit_all(&[
            ViewerEvent::FieldAdd(field.clone()),
            ViewerEvent::FieldsChange(snapshot),
        ]);
        Ok(field)
    }

    fn remove_field(&self, id: &FieldId) {
        let snapshot = {
            let mut state = self.lock();
            let Some(position) = state.fields.iter().position(|field| &field.id == id) else {
                tracing::debug!("Ignoring removal of unknown field {id}");
                return;
            };
            state.fields.remove(position);
            state.fields.clone()
        };
        self.emit_all(&[
            ViewerEvent::FieldRemove {
                field_id: id.clone(),
            },
            ViewerEvent::FieldsChange(snapshot),
        ]);
    }

    fn update_field(&self, id: &FieldId, patch: FieldPatch) {
        let snapshot = {
            let mut state = self.lock();
            let Some(field) = state.fields.iter_mut().find(|field| &field.id == id) else {
                tracing::debug!("Ignoring update of unknown field {id}");
                return;
            };
            field.apply(&patch);
            state.fields.clone()
        };
        self.emit_all(&[
            ViewerEvent::FieldUpdate {
                field_id: id.clone(),
                updates: patch,
            },
            ViewerEvent::FieldsChange(snapshot),
        ]);
    }

    fn replace_fields(&self, fields: Vec<Field>) {
        let snapshot = {
            let mut state = self.lock();
            state.fields = fields
                .into_iter()
                .map(|mut field| {
                    if field.id.is_empty() {
                        field.id = FieldId::new();
                    }
                    field
                })
                .collect();
            state.fields.clone()
        };
        self.bus.emit(&ViewerEvent::FieldsChange(snapshot));
    }

    /// Move a dropped field onto the page under the pointer, or the nearest one.
    fn handle_drop(&self, end: &DragEnd) {
        let Some(strategy) = self.strategy() else {
            return;
        };
        let Some(target) = strategy
            .page_at(end.pointer)
            .or_else(|| strategy.nearest_page(end.pointer))
        else {
            tracing::warn!("No page found for drop of field {}", end.field_id);
            return;
        };
        let Some(page_rect) = strategy.page_client_rect(target) else {
            tracing::warn!("Drop target page {target} is not materialised");
            return;
        };
        let scale = strategy.scale();

        let (page, size) = {
            let state = self.lock();
            let Some(page) = state.pages.get(target).copied() else {
                tracing::warn!("Drop target page {target} has no geometry");
                return;
            };
            let Some(field) = state.fields.iter().find(|field| field.id == end.field_id) else {
                tracing::warn!("Dropped field {} no longer exists", end.field_id);
                return;
            };
            (page, field.rect)
        };

        let local = sign_core::Rect::new(
            end.element_origin.x - page_rect.x,
            end.element_origin.y - page_rect.y,
            size.width * scale,
            size.height * scale,
        );
        let rect = clamp_to_page(screen_to_doc(local, page.height, scale), page);
        tracing::debug!(
            "Dropped field {} from page {} onto page {target}",
            end.field_id,
            end.source_page
        );
        self.update_field(&end.field_id, FieldPatch::placement(target, rect));
    }

    fn handle_resize(&self, end: &ResizeEnd) {
        let Some(strategy) = self.strategy() else {
            return;
        };
        let scale = strategy.scale();
        let Some(page) = self.lock().pages.get(end.page_index).copied() else {
            tracing::warn!("Resize on unknown page {}", end.page_index);
            return;
        };
        let rect = clamp_to_page(screen_to_doc(end.rect, page.height, scale), page);
        self.update_field(&end.field_id, FieldPatch::rect(rect));
    }

    fn subscribe(self: &Arc<Self>) {
        let mut ids = Vec::with_capacity(3);

        let weak: Weak<Self> = Arc::downgrade(self);
        ids.push((
            EventKind::DragEnd,
            self.bus.on(EventKind::DragEnd, move |event| {
                if let (Some(inner), ViewerEvent::DragEnd(end)) = (weak.upgrade(), event) {
                    inner.handle_drop(end);
                }
                Ok(())
            }),
        ));

        let weak: Weak<Self> = Arc::downgrade(self);
        ids.push((
            EventKind::ResizeEnd,
            self.bus.on(EventKind::ResizeEnd, move |event| {
                if let (Some(inner), ViewerEvent::ResizeEnd(end)) = (weak.upgrade(), event) {
                    inner.handle_resize(end);
                }
                Ok(())
            }),
        ));

        let weak: Weak<Self> = Arc::downgrade(self);
        ids.push((
            EventKind::FieldDelete,
            self.bus.on(EventKind::FieldDelete, move |event| {
                if let (Some(inner), ViewerEvent::FieldDelete { field_id }) =
                    (weak.upgrade(), event)
                {
                    inner.remove_field(field_id);
                }
                Ok(())
            }),
        ));

        *self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ids;
    }

    /// Initialise a strategy for `mode`, replacing the active one.
    async fn activate(&self, mode: ViewMode, initial_page: usize) -> ViewerResult<()> {
        let seq = self.strategy_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let strategy: Arc<dyn ViewModeStrategy> = match mode {
            ViewMode::Scroll => {
                Arc::new(ScrollStrategy::new(self.bus.clone(), self.config.clone()))
            }
            ViewMode::Single => {
                Arc::new(SinglePageStrategy::new(self.bus.clone(), self.config.clone()))
            }
        };

        let (ctx, previous) = {
            let mut state = self.lock();
            let Some(document) = state.document.clone() else {
                return Err(SignError::NotLoaded.into());
            };
            state.mode = mode;
            let previous = state.strategy.replace(Arc::clone(&strategy));
            let ctx = StrategyContext {
                document,
                pages: state.pages.clone(),
                fields: state.fields.clone(),
                scale: state.scale,
                initial_page,
                viewport_width: state.viewport_width,
                viewport_height: state.viewport_height,
            };
            (ctx, previous)
        };
        if let Some(previous) = previous {
            previous.destroy();
        }

        tracing::info!("Activating {mode} view on page {initial_page}");
        if let Err(e) = strategy.init(ctx).await {
            tracing::error!("Failed to initialise {mode} view: {e}");
            {
                let mut state = self.lock();
                if state
                    .strategy
                    .as_ref()
                    .is_some_and(|active| Arc::ptr_eq(active, &strategy))
                {
                    state.strategy = None;
                }
            }
            strategy.destroy();
            return Err(e);
        }

        if self.is_destroyed() || self.strategy_seq.load(Ordering::SeqCst) != seq {
            strategy.destroy();
        }
        Ok(())
    }
}

/// Owner of the field model and entry point for hosts.
///
/// Cheap to clone; clones share the same viewer.
#[derive(Clone)]
pub struct DocumentController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DocumentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("DocumentController")
            .field("load", &state.load)
            .field("pages", &state.pages.len())
            .field("fields", &state.fields.len())
            .field("mode", &state.mode)
            .field("destroyed", &self.inner.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl DocumentController {
    /// Create a controller that opens documents with `rasterizer`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidConfig`] if `config` fails validation.
    pub fn new(rasterizer: Arc<dyn Rasterizer>, config: ViewerConfig) -> ViewerResult<Self> {
        config.validate()?;
        let state = ControllerState {
            load: LoadState::Unloaded,
            load_seq: 0,
            document: None,
            source: None,
            pages: Vec::new(),
            fields: Vec::new(),
            strategy: None,
            mode: config.default_view_mode,
            scale: config.clamp_scale(config.initial_scale),
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            zoom: ZoomGesture::new(&config),
            pointer_page: None,
            print: None,
        };
        let inner = Arc::new(Inner {
            config,
            bus: EventBus::new(),
            rasterizer,
            state: Mutex::new(state),
            subscriptions: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            strategy_seq: AtomicU64::new(0),
        });
        inner.subscribe();
        Ok(Self { inner })
    }

    /// The viewer's event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    /// Install the pipeline used by [`Self::print`].
    pub fn set_print_pipeline(&self, pipeline: Arc<dyn PrintPipeline>) {
        self.inner.lock().print = Some(pipeline);
    }

    /// Load a document and show it in the current view mode.
    ///
    /// Page geometry for every page is cached before the view is built.
    ///
    /// # Errors
    ///
    /// Returns the rasterizer's error; an `Error` event is emitted as well and
    /// the controller is left without a document.
    pub async fn load(&self, source: DocumentSource) -> ViewerResult<()> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(ViewerError::Destroyed);
        }

        let (seq, previous) = {
            let mut state = inner.lock();
            state.load_seq += 1;
            state.load = LoadState::Loading;
            state.document = None;
            state.source = None;
            state.pages.clear();
            state.pointer_page = None;
            (state.load_seq, state.strategy.take())
        };
        if let Some(previous) = previous {
            previous.destroy();
        }

        let loaded = self.open(source.clone()).await;
        if inner.is_destroyed() {
            return Err(ViewerError::Destroyed);
        }
        let (document, pages) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                {
                    let mut state = inner.lock();
                    if state.load_seq == seq {
                        state.load = LoadState::Unloaded;
                    }
                }
                tracing::error!("Failed to load document: {e}");
                inner.bus.emit(&ViewerEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let (mode, num_pages) = {
            let mut state = inner.lock();
            if state.load_seq != seq {
                tracing::debug!("Discarding superseded load");
                return Ok(());
            }
            state.document = Some(document);
            state.source = Some(source);
            state.pages = pages;
            state.load = LoadState::Ready;
            (state.mode, state.pages.len())
        };

        tracing::info!("Loaded document with {num_pages} pages");
        inner.bus.emit(&ViewerEvent::DocumentLoaded { num_pages });

        inner.activate(mode, 1).await
    }

    async fn open(
        &self,
        source: DocumentSource,
    ) -> ViewerResult<(Arc<dyn DocumentHandle>, Vec<PageSize>)> {
        let document = self.inner.rasterizer.load_document(source).await?;
        let mut pages = Vec::with_capacity(document.num_pages());
        for index in 0..document.num_pages() {
            let page = document.page(index).await?;
            pages.push(page.viewport(1.0).page_size());
        }
        Ok((document, pages))
    }

    /// Switch view mode, keeping the current page and scale.
    ///
    /// # Errors
    ///
    /// Returns an error if the new strategy cannot be initialised.
    pub async fn set_view_mode(&self, mode: ViewMode) -> ViewerResult<()> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(ViewerError::Destroyed);
        }
        let page = {
            let mut state = inner.lock();
            let same = state.mode == mode && state.strategy.is_some();
            if same {
                return Ok(());
            }
            if state.load != LoadState::Ready {
                state.mode = mode;
                return Ok(());
            }
            state.pointer_page = None;
            let page = state.strategy.as_ref().map_or(1, |s| s.current_page().max(1));
            if let Some(strategy) = &state.strategy {
                state.scale = strategy.scale();
            }
            page
        };
        inner.activate(mode, page).await
    }

    /// Current view mode.
    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.inner.lock().mode
    }

    /// Navigate to a page (1-based).
    pub fn go_to_page(&self, page: usize) {
        if let Some(strategy) = self.inner.strategy() {
            strategy.go_to_page(page);
        }
    }

    /// Navigate to the next page.
    pub fn next_page(&self) {
        if let Some(strategy) = self.inner.strategy() {
            strategy.next_page();
        }
    }

    /// Navigate to the previous page.
    pub fn previous_page(&self) {
        if let Some(strategy) = self.inner.strategy() {
            strategy.previous_page();
        }
    }

    /// Current page (1-based, 0 without a document).
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.inner.strategy().map_or(0, |s| s.current_page())
    }

    /// Number of pages (0 without a document).
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.inner.lock().pages.len()
    }

    /// Zoom; the value is clamped to the configured range.
    pub fn set_scale(&self, scale: f64) {
        let scale = self.inner.config.clamp_scale(scale);
        let strategy = {
            let mut state = self.inner.lock();
            state.scale = scale;
            state.strategy.clone()
        };
        if let Some(strategy) = strategy {
            strategy.set_scale(scale);
        }
    }

    /// Current scale.
    #[must_use]
    pub fn scale(&self) -> f64 {
        let (strategy, scale) = {
            let state = self.inner.lock();
            (state.strategy.clone(), state.scale)
        };
        strategy.map_or(scale, |s| s.scale())
    }

    /// Surface of a materialised page (0-based).
    #[must_use]
    pub fn surface(&self, index: usize) -> Option<Arc<PageSurface>> {
        self.inner.strategy().and_then(|s| s.surface(index))
    }

    /// Unscaled size of a page (0-based), from the geometry cache.
    #[must_use]
    pub fn page_dimensions(&self, index: usize) -> Option<PageSize> {
        self.inner.lock().pages.get(index).copied()
    }

    /// Replace the whole field list. Missing ids are generated.
    pub fn set_fields(&self, fields: Vec<Field>) {
        self.inner.replace_fields(fields);
    }

    /// Snapshot of the field list.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.inner.lock().fields.clone()
    }

    /// Validate and append a field, returning it with its id.
    ///
    /// # Errors
    ///
    /// [`SignError::NotLoaded`] without a document, [`SignError::NotReady`]
    /// while loading, [`SignError::DuplicateField`] for a reused id, or a
    /// [`SignError::Validation`] if the field does not fit its page. The
    /// field list is unchanged on error.
    pub fn add_field(&self, field: Field) -> ViewerResult<Field> {
        self.inner.add_field(field)
    }

    /// Remove a field. Unknown ids are ignored.
    pub fn remove_field(&self, id: &FieldId) {
        self.inner.remove_field(id);
    }

    /// Merge a patch into a field. Unknown ids are ignored.
    pub fn update_field(&self, id: &FieldId, patch: FieldPatch) {
        self.inner.update_field(id, patch);
    }

    /// Remove every field.
    pub fn clear_fields(&self) {
        self.inner.replace_fields(Vec::new());
    }

    /// Send the document to the print pipeline.
    ///
    /// # Errors
    ///
    /// [`ViewerError::NoPrintPipeline`] if none is installed,
    /// [`SignError::NotLoaded`] without a document, or the pipeline's error.
    pub async fn print(&self, options: PrintOptions) -> ViewerResult<()> {
        let (pipeline, job) = {
            let state = self.inner.lock();
            let pipeline = state.print.clone().ok_or(ViewerError::NoPrintPipeline)?;
            let source = match (&state.load, &state.source) {
                (LoadState::Ready, Some(source)) => source.clone(),
                _ => return Err(SignError::NotLoaded.into()),
            };
            let fields = if options.with_signatures {
                state.fields.clone()
            } else {
                Vec::new()
            };
            (
                pipeline,
                PrintJob {
                    source,
                    pages: state.pages.clone(),
                    fields,
                },
            )
        };
        tracing::info!(
            "Printing {} pages with {} fields",
            job.pages.len(),
            job.fields.len()
        );
        pipeline.print(job).await
    }

    /// Subscribe to an event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ViewerEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.bus.on(kind, handler)
    }

    /// Unsubscribe.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) {
        self.inner.bus.off(kind, id);
    }

    /// Tear everything down. Safe to call more than once.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let strategy = {
            let mut state = inner.lock();
            state.load = LoadState::Unloaded;
            state.document = None;
            state.pointer_page = None;
            state.strategy.take()
        };
        if let Some(strategy) = strategy {
            strategy.destroy();
        }
        let subscriptions = std::mem::take(
            &mut *inner
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (kind, id) in subscriptions {
            inner.bus.off(kind, id);
        }
        inner.bus.clear();
        tracing::debug!("Document controller destroyed");
    }

    /// Resize the viewport.
    pub fn set_viewport(&self, width: f64, height: f64) {
        let strategy = {
            let mut state = self.inner.lock();
            state.viewport_width = width;
            state.viewport_height = height;
            state.strategy.clone()
        };
        if let Some(strategy) = strategy {
            strategy.set_viewport(width, height);
        }
    }

    /// Scroll the viewport to a content offset.
    pub fn scroll_to(&self, top: f64) {
        if let Some(strategy) = self.inner.strategy() {
            strategy.scroll_to(top);
        }
    }

    /// Current scroll offset.
    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        self.inner.strategy().map_or(0.0, |s| s.scroll_top())
    }

    /// Route pointer input to the page overlays.
    ///
    /// A press goes to the overlay with something under the pointer, falling
    /// back to the page under it; the rest of the gesture follows that page.
    /// Multi-touch input cancels any gesture and is left to the zoom recognizer.
    pub fn handle_pointer(&self, event: &PointerEvent) {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return;
        }
        let Some(strategy) = inner.strategy() else {
            return;
        };
        let point = event.position();

        if event.is_multi_touch() {
            inner.lock().pointer_page = None;
            for surface in strategy.surfaces() {
                surface.cancel_gesture();
            }
            return;
        }

        match event.phase {
            PointerPhase::Down => {
                let surfaces = strategy.surfaces();
                let origin_of = |index: usize| {
                    strategy
                        .page_client_rect(index)
                        .map(|rect| rect.origin())
                };
                let hit = surfaces.iter().find_map(|surface| {
                    let origin = origin_of(surface.index())?;
                    surface
                        .hits(point, origin)
                        .then(|| (Arc::clone(surface), origin))
                });
                let target = hit.or_else(|| {
                    let index = strategy.page_at(point)?;
                    Some((strategy.surface(index)?, origin_of(index)?))
                });
                let Some((surface, origin)) = target else {
                    inner.lock().pointer_page = None;
                    return;
                };
                inner.lock().pointer_page = Some(surface.index());
                surface.pointer_down(point, origin);
            }
            PointerPhase::Move => {
                let active = inner.lock().pointer_page;
                match active.and_then(|index| strategy.surface(index)) {
                    Some(surface) => {
                        surface.pointer_move(point);
                    }
                    None => {
                        for surface in strategy.surfaces() {
                            if let Some(rect) = strategy.page_client_rect(surface.index()) {
                                surface.update_hover(point, rect.origin());
                            }
                        }
                    }
                }
            }
            PointerPhase::Up => {
                let active = inner.lock().pointer_page.take();
                if let Some(surface) = active.and_then(|index| strategy.surface(index)) {
                    surface.pointer_up(point);
                }
            }
            PointerPhase::Cancel => {
                let active = inner.lock().pointer_page.take();
                if let Some(surface) = active.and_then(|index| strategy.surface(index)) {
                    surface.cancel_gesture();
                }
            }
        }
    }

    /// Feed wheel and touch input to the zoom recognizer.
    ///
    /// A second touch contact cancels any drag or resize in progress.
    pub fn handle_zoom_input(&self, input: &ZoomInput) {
        if self.inner.is_destroyed() {
            return;
        }
        if let ZoomInput::TouchStart { touches } = input {
            if touches.len() >= 2 {
                self.inner.lock().pointer_page = None;
                if let Some(strategy) = self.inner.strategy() {
                    for surface in strategy.surfaces() {
                        surface.cancel_gesture();
                    }
                }
            }
        }
        let current = self.scale();
        let next = self.inner.lock().zoom.handle(input, current);
        if let Some(scale) = next {
            self.set_scale(scale);
        }
    }
}
