//! # Saorsa Sign Core
//!
//! Core overlay logic for placing signature and annotation fields on paged
//! documents. Everything here is synchronous and free of any rendering
//! backend; `sign-viewer` drives it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 sign-core                   │
//! ├─────────────────────────────────────────────┤
//! │  Field Model       │  Coordinate Engine     │
//! │  - Fields/patches  │  - Document ↔ screen   │
//! │  - Validation      │  - Page clamping       │
//! ├─────────────────────────────────────────────┤
//! │  Field Overlay     │  Interaction Manager   │
//! │  - Visual state    │  - Drag / resize       │
//! │  - Hit testing     │  - Zoom gestures       │
//! ├─────────────────────────────────────────────┤
//! │  Event Bus         │  Viewer Config         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Document space has its origin at the bottom-left of a page and is measured
//! in unscaled points. Screen space has its origin at the top-left and is
//! measured in pixels at the current scale.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod config;
pub mod coords;
pub mod error;
pub mod event;
pub mod field;
pub mod geometry;
pub mod interaction;
pub mod overlay;
pub mod zoom;

pub use bus::{
    DragEnd, EventBus, EventKind, HandlerError, HandlerResult, ResizeEnd, SubscriptionId,
    ViewerEvent,
};
pub use config::{ViewMode, ViewerConfig};
pub use coords::{clamp_to_page, doc_to_screen, screen_to_doc};
pub use error::{SignError, SignResult, ValidationError};
pub use event::{PointerEvent, PointerPhase, PointerSource, TouchPoint, ZoomInput};
pub use field::{Field, FieldId, FieldKind, FieldPatch};
pub use geometry::{nearest_rect, PageSize, Point, Rect};
pub use interaction::{
    Gesture, GestureOutcome, GestureUpdate, HandleDirection, HitTarget, InteractionManager, Press,
};
pub use overlay::{ContentNode, FieldOverlay, FieldVisual, HandleVisual};
pub use zoom::ZoomGesture;

/// Sign core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
