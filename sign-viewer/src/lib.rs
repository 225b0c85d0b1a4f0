//! # Saorsa Sign Viewer
//!
//! Async document viewer built on `sign-core`. It rasterizes pages through a
//! pluggable [`Rasterizer`], lays them out in one of two view modes and keeps
//! the field overlay of every materialised page in sync with the
//! [`DocumentController`]'s field list.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            DocumentController               │
//! │  field list · geometry cache · input        │
//! ├──────────────────────┬──────────────────────┤
//! │  ScrollStrategy      │  SinglePageStrategy  │
//! │  - all pages stacked │  - one page shown    │
//! ├──────────────────────┴──────────────────────┤
//! │  PageSurface: raster + FieldOverlay         │
//! ├─────────────────────────────────────────────┤
//! │  Rasterizer (MemoryRasterizer, ...)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything talks through the [`sign_core::EventBus`] owned by the
//! controller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod error;
pub mod layout;
pub mod memory;
pub mod print;
pub mod rasterizer;
pub mod strategy;
pub mod surface;

pub use controller::DocumentController;
pub use error::{RenderError, RenderResult, ViewerError, ViewerResult};
pub use layout::{PageLayout, ScrollAnchor};
pub use memory::MemoryRasterizer;
pub use print::{PrintJob, PrintOptions, PrintPipeline};
pub use rasterizer::{
    DocumentHandle, DocumentSource, PageHandle, RasterSurface, Rasterizer, Viewport,
};
pub use strategy::{ScrollStrategy, SinglePageStrategy, StrategyContext, ViewModeStrategy};
pub use surface::{PageSurface, RasterStatus, RenderQuality};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
