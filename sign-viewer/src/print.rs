//! Print collaborator interface.
//!
//! The viewer does not rasterize documents for print; it assembles a
//! [`PrintJob`] and hands it to whatever [`PrintPipeline`] the host installed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sign_core::{Field, PageSize};

use crate::error::ViewerResult;
use crate::rasterizer::DocumentSource;

/// Options for [`DocumentController::print`](crate::DocumentController::print).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintOptions {
    /// Burn the field overlay into the output.
    pub with_signatures: bool,
}

/// Everything needed to print the current document.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    /// Document the pages come from.
    pub source: DocumentSource,
    /// Unscaled size of every page.
    pub pages: Vec<PageSize>,
    /// Fields to draw over the pages (empty without signatures).
    pub fields: Vec<Field>,
}

impl PrintJob {
    /// Fields on one page.
    #[must_use]
    pub fn fields_on(&self, page_index: usize) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(move |field| field.page_index == page_index)
    }
}

/// Receives print jobs.
#[async_trait]
pub trait PrintPipeline: Send + Sync {
    /// Print a job.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`ViewerError::Print`](crate::ViewerError::Print).
    async fn print(&self, job: PrintJob) -> ViewerResult<()>;
}
