//! Rasterizer collaborator interface.
//!
//! The viewer never parses documents itself. A [`Rasterizer`] opens a
//! [`DocumentSource`] and hands back page handles that know their natural
//! size and can draw into a [`RasterSurface`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sign_core::PageSize;

use crate::error::RenderResult;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A URL (`file:`, `data:` or anything the rasterizer understands).
    Url(String),
    /// Raw document bytes.
    Bytes(Vec<u8>),
}

impl DocumentSource {
    /// Source for a local file.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match url::Url::from_file_path(path) {
            Ok(url) => Self::Url(url.to_string()),
            Err(()) => Self::Url(path.display().to_string()),
        }
    }
}

impl From<&str> for DocumentSource {
    fn from(value: &str) -> Self {
        Self::Url(value.to_string())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Page geometry at a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Scale the viewport was computed for.
    pub scale: f64,
}

impl Viewport {
    /// Viewport for a page size at a scale.
    #[must_use]
    pub fn for_page(size: PageSize, scale: f64) -> Self {
        Self {
            width: size.width * scale,
            height: size.height * scale,
            scale,
        }
    }

    /// Unscaled page size this viewport was derived from.
    #[must_use]
    pub fn page_size(&self) -> PageSize {
        if self.scale > 0.0 {
            PageSize::new(self.width / self.scale, self.height / self.scale)
        } else {
            PageSize::new(self.width, self.height)
        }
    }
}

/// A pixel buffer a page is drawn into.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    /// Width in device pixels.
    pub pixel_width: u32,
    /// Height in device pixels.
    pub pixel_height: u32,
    /// Scale the pixels were rendered at.
    pub render_scale: f64,
    /// RGBA8 pixel data, filled by the rasterizer.
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    /// Allocate a surface covering a viewport, rounding up to whole pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_viewport(viewport: &Viewport) -> Self {
        let to_px = |v: f64| v.max(0.0).ceil().min(f64::from(u32::MAX)) as u32;
        Self {
            pixel_width: to_px(viewport.width),
            pixel_height: to_px(viewport.height),
            render_scale: viewport.scale,
            pixels: Vec::new(),
        }
    }

    /// Number of bytes a fully drawn RGBA surface occupies.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixel_width as usize * self.pixel_height as usize * 4
    }
}

/// Opens documents.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Open a document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Load`](crate::error::RenderError::Load) if the
    /// source cannot be read or parsed.
    async fn load_document(&self, source: DocumentSource) -> RenderResult<Arc<dyn DocumentHandle>>;
}

/// An opened document.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    /// Number of pages.
    fn num_pages(&self) -> usize;

    /// Resolve a page (0-based).
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PageNotFound`](crate::error::RenderError::PageNotFound)
    /// for indices past the end.
    async fn page(&self, index: usize) -> RenderResult<Arc<dyn PageHandle>>;
}

/// A resolved page.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Page index (0-based).
    fn index(&self) -> usize;

    /// Geometry at a scale.
    fn viewport(&self, scale: f64) -> Viewport;

    /// Draw the page into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Failed`](crate::error::RenderError::Failed) on
    /// rasterization failure, or `Cancelled` if the rasterizer gave up on
    /// its own.
    async fn render(&self, target: &mut RasterSurface, viewport: Viewport) -> RenderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_round_trips_page_size() {
        let viewport = Viewport::for_page(PageSize::new(612.0, 792.0), 1.5);
        assert!((viewport.width - 918.0).abs() < f64::EPSILON);
        assert_eq!(viewport.page_size(), PageSize::new(612.0, 792.0));
    }

    #[test]
    fn test_surface_rounds_up() {
        let surface = RasterSurface::for_viewport(&Viewport {
            width: 10.2,
            height: 4.0,
            scale: 1.0,
        });
        assert_eq!((surface.pixel_width, surface.pixel_height), (11, 4));
        assert_eq!(surface.byte_len(), 11 * 4 * 4);
    }

    #[test]
    fn test_source_from_path_is_file_url() {
        let source = DocumentSource::from_path(Path::new("/tmp/doc.json"));
        assert_eq!(source, DocumentSource::Url("file:///tmp/doc.json".to_string()));
    }
}
