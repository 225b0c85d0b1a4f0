//! # Coordinate Engine
//!
//! Converts between document space and screen space.
//!
//! ```text
//!   document space (points)        screen space (pixels)
//!   ┌──────────────────┐           (0,0) ──────────► x
//!   │                  │             │ ┌──────────────┐
//!   │      ┌───┐       │   scale     │ │      ┌───┐   │
//!   │      └───┘       │  ───────►   │ │      └───┘   │
//!   ▲ y                │             ▼ y              │
//!   (0,0) ─────────► x                 └──────────────┘
//! ```
//!
//! Document Y grows upward from the page bottom, screen Y grows downward, so
//! every conversion needs the page's unscaled height.

use crate::geometry::{PageSize, Rect};

/// Convert a document-space rect to page-local screen pixels.
#[must_use]
pub fn doc_to_screen(rect: Rect, page_height: f64, scale: f64) -> Rect {
    Rect {
        x: rect.x * scale,
        y: (page_height - rect.y - rect.height) * scale,
        width: rect.width * scale,
        height: rect.height * scale,
    }
}

/// Convert a page-local screen rect back to document space.
///
/// A non-positive scale has no meaningful inverse; the rect is returned as-is.
#[must_use]
pub fn screen_to_doc(rect: Rect, page_height: f64, scale: f64) -> Rect {
    if scale <= 0.0 {
        return rect;
    }
    let height = rect.height / scale;
    Rect {
        x: rect.x / scale,
        y: page_height - rect.y / scale - height,
        width: rect.width / scale,
        height,
    }
}

/// Clamp a document rect so it lies fully inside the page.
///
/// Oversized rects are shrunk to the page first, then shifted inside.
#[must_use]
pub fn clamp_to_page(rect: Rect, page: PageSize) -> Rect {
    let width = rect.width.min(page.width);
    let height = rect.height.min(page.height);
    Rect {
        x: rect.x.clamp(0.0, page.width - width),
        y: rect.y.clamp(0.0, page.height - height),
        width,
        height,
    }
}
