//! # Event Bus
//!
//! Synchronous publish/subscribe scoped to one viewer instance.
//!
//! Handlers for an event run in subscription order. A handler that returns an
//! error or panics is logged and skipped; the remaining handlers still run and
//! the emitter never sees the failure.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::field::{Field, FieldId, FieldPatch};
use crate::geometry::{Point, Rect};

/// Error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result a handler returns.
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&ViewerEvent) -> HandlerResult + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event names handlers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `document:loaded`
    DocumentLoaded,
    /// `page:change`
    PageChange,
    /// `scale:change`
    ScaleChange,
    /// `field:add`
    FieldAdd,
    /// `field:remove`
    FieldRemove,
    /// `field:update`
    FieldUpdate,
    /// `fields:change`
    FieldsChange,
    /// `error`
    Error,
    /// `drag:end`
    DragEnd,
    /// `resize:end`
    ResizeEnd,
    /// `field:delete`
    FieldDelete,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DocumentLoaded => "document:loaded",
            Self::PageChange => "page:change",
            Self::ScaleChange => "scale:change",
            Self::FieldAdd => "field:add",
            Self::FieldRemove => "field:remove",
            Self::FieldUpdate => "field:update",
            Self::FieldsChange => "fields:change",
            Self::Error => "error",
            Self::DragEnd => "drag:end",
            Self::ResizeEnd => "resize:end",
            Self::FieldDelete => "field:delete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Final state of a drag gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragEnd {
    /// Dragged field.
    pub field_id: FieldId,
    /// Page the drag started on.
    pub source_page: usize,
    /// Pointer position at release (client coordinates).
    pub pointer: Point,
    /// Top-left corner of the dragged element at release (client coordinates).
    pub element_origin: Point,
}

/// Final state of a resize gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeEnd {
    /// Resized field.
    pub field_id: FieldId,
    /// Page the field lives on.
    pub page_index: usize,
    /// Final rect in page-local screen pixels.
    pub rect: Rect,
}

/// Payloads carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ViewerEvent {
    /// A document finished loading.
    DocumentLoaded {
        /// Number of pages.
        num_pages: usize,
    },
    /// Current page changed (1-based).
    PageChange {
        /// Current page number.
        page: usize,
        /// Total pages.
        total: usize,
    },
    /// Zoom changed.
    ScaleChange {
        /// New scale.
        scale: f64,
    },
    /// A field was added.
    FieldAdd(Field),
    /// A field was removed.
    FieldRemove {
        /// Removed field.
        field_id: FieldId,
    },
    /// A field was patched.
    FieldUpdate {
        /// Patched field.
        field_id: FieldId,
        /// The patch that was applied.
        updates: FieldPatch,
    },
    /// Snapshot of the full field list after any mutation.
    FieldsChange(Vec<Field>),
    /// An operational error.
    Error {
        /// Human readable message.
        message: String,
    },
    /// A drag gesture finished with movement.
    DragEnd(DragEnd),
    /// A resize gesture finished with a changed rect.
    ResizeEnd(ResizeEnd),
    /// The delete control of a field was activated.
    FieldDelete {
        /// Field to delete.
        field_id: FieldId,
    },
}

impl ViewerEvent {
    /// The subscription key for this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::DocumentLoaded { .. } => EventKind::DocumentLoaded,
            Self::PageChange { .. } => EventKind::PageChange,
            Self::ScaleChange { .. } => EventKind::ScaleChange,
            Self::FieldAdd(_) => EventKind::FieldAdd,
            Self::FieldRemove { .. } => EventKind::FieldRemove,
            Self::FieldUpdate { .. } => EventKind::FieldUpdate,
            Self::FieldsChange(_) => EventKind::FieldsChange,
            Self::Error { .. } => EventKind::Error,
            Self::DragEnd(_) => EventKind::DragEnd,
            Self::ResizeEnd(_) => EventKind::ResizeEnd,
            Self::FieldDelete { .. } => EventKind::FieldDelete,
        }
    }
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// Cloneable handle to a shared event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let counts: HashMap<_, _> = inner
            .handlers
            .iter()
            .map(|(kind, handlers)| (kind.name(), handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to an event.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ViewerEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unsubscribe. Unknown ids are ignored.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) {
        let mut inner = self.lock();
        if let Some(handlers) = inner.handlers.get_mut(&kind) {
            handlers.retain(|(existing, _)| *existing != id);
        }
    }

    /// Deliver an event to every current subscriber of its kind.
    ///
    /// Handlers added or removed by a running handler take effect from the
    /// next emit.
    pub fn emit(&self, event: &ViewerEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let inner = self.lock();
            match inner.handlers.get(&kind) {
                Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Error in handler for event \"{kind}\": {e}");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("Handler for event \"{kind}\" panicked: {message}");
                }
            }
        }
    }

    /// Number of subscribers for an event.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scale_event() -> ViewerEvent {
        ViewerEvent::ScaleChange { scale: 2.0 }
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.on(EventKind::ScaleChange, move |_| {
                order.lock().expect("lock").push(n);
                Ok(())
            });
        }
        bus.emit(&scale_event());
        assert_eq!(*order.lock().expect("lock"), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::ScaleChange, |_| Err("boom".into()));
        bus.on(EventKind::ScaleChange, |_| panic!("handler exploded"));
        let counter = Arc::clone(&calls);
        bus.on(EventKind::ScaleChange, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(&scale_event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&calls);
        let id = bus.on(EventKind::ScaleChange, move |_| {
            first.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });
        let second = Arc::clone(&calls);
        bus.on(EventKind::ScaleChange, move |_| {
            second.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.off(EventKind::ScaleChange, id);
        bus.emit(&scale_event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::ScaleChange), 1);
    }

    #[test]
    fn test_events_only_reach_their_kind() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.on(EventKind::PageChange, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bus.emit(&scale_event());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_emit_reentrantly() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        bus.on(EventKind::ScaleChange, move |_| {
            inner_bus.emit(&ViewerEvent::PageChange { page: 1, total: 1 });
            Ok(())
        });
        let counter = Arc::clone(&calls);
        bus.on(EventKind::PageChange, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(&scale_event());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let bus = EventBus::new();
        bus.on(EventKind::ScaleChange, |_| Ok(()));
        bus.on(EventKind::Error, |_| Ok(()));
        bus.clear();
        assert_eq!(bus.handler_count(EventKind::ScaleChange), 0);
        assert_eq!(bus.handler_count(EventKind::Error), 0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(ViewerEvent::PageChange { page: 2, total: 3 })
            .expect("should serialize");
        assert_eq!(json["event"], "pageChange");
        assert_eq!(json["data"]["total"], 3);
    }
}
