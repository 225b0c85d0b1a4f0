//! In-memory rasterizer.
//!
//! Documents are JSON page-size descriptions:
//!
//! ```json
//! { "pages": [[612, 792], [612, 792], [842, 595]] }
//! ```
//!
//! They can be passed as bytes, as a `data:` URL (base64 or plain) or as a
//! `file:` URL / plain path. Rendering fills the target with opaque white.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sign_core::PageSize;

use crate::error::{RenderError, RenderResult};
use crate::rasterizer::{
    DocumentHandle, DocumentSource, PageHandle, RasterSurface, Rasterizer, Viewport,
};

#[derive(Debug, Serialize, Deserialize)]
struct Description {
    pages: Vec<[f64; 2]>,
}

/// Rasterizer for JSON page descriptions.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterizer {
    render_delay: Duration,
    failing_pages: HashSet<usize>,
    renders: Arc<AtomicUsize>,
}

impl MemoryRasterizer {
    /// Create a rasterizer that renders instantly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every render take `delay`.
    #[must_use]
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Make renders of one page fail.
    #[must_use]
    pub fn with_failing_page(mut self, index: usize) -> Self {
        self.failing_pages.insert(index);
        self
    }

    /// Number of renders that ran to completion.
    #[must_use]
    pub fn completed_renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Encode page sizes as a document description.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn describe(pages: &[PageSize]) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&Description {
            pages: pages.iter().map(|p| [p.width, p.height]).collect(),
        })
    }

    fn parse(bytes: &[u8]) -> RenderResult<Vec<PageSize>> {
        let description: Description = serde_json::from_slice(bytes)
            .map_err(|e| RenderError::Load(format!("invalid document description: {e}")))?;
        if description.pages.is_empty() {
            return Err(RenderError::Load("document has no pages".to_string()));
        }
        description
            .pages
            .iter()
            .enumerate()
            .map(|(index, &[width, height])| {
                if width > 0.0 && height > 0.0 {
                    Ok(PageSize::new(width, height))
                } else {
                    Err(RenderError::Load(format!(
                        "page {index} has invalid size {width}x{height}"
                    )))
                }
            })
            .collect()
    }

    async fn read(source: DocumentSource) -> RenderResult<Vec<u8>> {
        let raw = match source {
            DocumentSource::Bytes(bytes) => return Ok(bytes),
            DocumentSource::Url(raw) => raw,
        };

        match url::Url::parse(&raw) {
            Ok(url) if url.scheme() == "data" => decode_data_url(&raw),
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| RenderError::Load(format!("invalid file URL: {raw}")))?;
                read_file(path).await
            }
            Ok(url) => Err(RenderError::Load(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            ))),
            Err(url::ParseError::RelativeUrlWithoutBase) => read_file(PathBuf::from(raw)).await,
            Err(e) => Err(RenderError::Load(format!("invalid URL {raw}: {e}"))),
        }
    }
}

fn decode_data_url(raw: &str) -> RenderResult<Vec<u8>> {
    let body = raw.strip_prefix("data:").unwrap_or(raw);
    let (meta, payload) = body
        .split_once(',')
        .ok_or_else(|| RenderError::Load("data URL has no payload".to_string()))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| RenderError::Load(format!("invalid base64 payload: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

async fn read_file(path: PathBuf) -> RenderResult<Vec<u8>> {
    tokio::fs::read(&path)
        .await
        .map_err(|e| RenderError::Load(format!("failed to read {}: {e}", path.display())))
}

#[async_trait]
impl Rasterizer for MemoryRasterizer {
    async fn load_document(&self, source: DocumentSource) -> RenderResult<Arc<dyn DocumentHandle>> {
        let bytes = Self::read(source).await?;
        let sizes = Self::parse(&bytes)?;
        tracing::debug!("Loaded in-memory document with {} pages", sizes.len());

        let pages = sizes
            .into_iter()
            .enumerate()
            .map(|(index, size)| {
                Arc::new(MemoryPage {
                    index,
                    size,
                    delay: self.render_delay,
                    fails: self.failing_pages.contains(&index),
                    renders: Arc::clone(&self.renders),
                })
            })
            .collect();
        Ok(Arc::new(MemoryDocument { pages }))
    }
}

struct MemoryDocument {
    pages: Vec<Arc<MemoryPage>>,
}

#[async_trait]
impl DocumentHandle for MemoryDocument {
    fn num_pages(&self) -> usize {
        self.pages.len()
    }

    async fn page(&self, index: usize) -> RenderResult<Arc<dyn PageHandle>> {
        self.pages
            .get(index)
            .map(|page| Arc::clone(page) as Arc<dyn PageHandle>)
            .ok_or(RenderError::PageNotFound(index))
    }
}

struct MemoryPage {
    index: usize,
    size: PageSize,
    delay: Duration,
    fails: bool,
    renders: Arc<AtomicUsize>,
}

#[async_trait]
impl PageHandle for MemoryPage {
    fn index(&self) -> usize {
        self.index
    }

    fn viewport(&self, scale: f64) -> Viewport {
        Viewport::for_page(self.size, scale)
    }

    async fn render(&self, target: &mut RasterSurface, viewport: Viewport) -> RenderResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fails {
            return Err(RenderError::Failed(format!(
                "page {} could not be rasterized",
                self.index
            )));
        }
        target.render_scale = viewport.scale;
        target.pixels.clear();
        target.pixels.resize(target.byte_len(), 0xFF);
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"pages":[[612,792],[842,595]]}"#;

    #[tokio::test]
    async fn test_loads_bytes() {
        let doc = MemoryRasterizer::new()
            .load_document(DocumentSource::Bytes(DOC.as_bytes().to_vec()))
            .await
            .expect("should load");
        assert_eq!(doc.num_pages(), 2);
        let page = doc.page(1).await.expect("page 1");
        assert_eq!(page.viewport(1.0).page_size(), PageSize::new(842.0, 595.0));
    }

    #[tokio::test]
    async fn test_loads_base64_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(DOC);
        let source = DocumentSource::Url(format!("data:application/json;base64,{encoded}"));
        let doc = MemoryRasterizer::new()
            .load_document(source)
            .await
            .expect("should load");
        assert_eq!(doc.num_pages(), 2);
    }

    #[tokio::test]
    async fn test_loads_file_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        std::fs::write(&path, DOC).expect("write");

        let doc = MemoryRasterizer::new()
            .load_document(DocumentSource::from_path(&path))
            .await
            .expect("should load");
        assert_eq!(doc.num_pages(), 2);
    }

    #[tokio::test]
    async fn test_rejects_bad_descriptions() {
        let rasterizer = MemoryRasterizer::new();
        for bad in [r#"{"pages":[]}"#, r#"{"pages":[[0,10]]}"#, "not json"] {
            let result = rasterizer
                .load_document(DocumentSource::Bytes(bad.as_bytes().to_vec()))
                .await;
            assert!(matches!(result, Err(RenderError::Load(_))), "{bad}");
        }
        let result = rasterizer
            .load_document(DocumentSource::Url("https://example.com/doc.pdf".to_string()))
            .await;
        assert!(matches!(result, Err(RenderError::Load(_))));
    }

    #[tokio::test]
    async fn test_render_fills_surface() {
        let rasterizer = MemoryRasterizer::new();
        let doc = rasterizer
            .load_document(DocumentSource::Bytes(DOC.as_bytes().to_vec()))
            .await
            .expect("should load");
        let page = doc.page(0).await.expect("page");
        let viewport = page.viewport(0.5);
        let mut surface = RasterSurface::for_viewport(&viewport);
        page.render(&mut surface, viewport)
            .await
            .expect("should render");
        assert_eq!(surface.pixels.len(), 306 * 396 * 4);
        assert_eq!(rasterizer.completed_renders(), 1);
    }

    #[tokio::test]
    async fn test_unknown_page() {
        let doc = MemoryRasterizer::new()
            .load_document(DocumentSource::Bytes(DOC.as_bytes().to_vec()))
            .await
            .expect("should load");
        assert!(matches!(doc.page(5).await, Err(RenderError::PageNotFound(5))));
    }
}
