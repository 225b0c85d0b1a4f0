//! Viewer error types.

use sign_core::{SignError, ValidationError};
use thiserror::Error;

/// Result type for rasterizer and surface operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while loading or rasterizing a document.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A newer render superseded this one. Never surfaced to callers.
    #[error("Render cancelled")]
    Cancelled,

    /// Rasterization failed.
    #[error("Render failed: {0}")]
    Failed(String),

    /// The document could not be loaded.
    #[error("Failed to load document: {0}")]
    Load(String),

    /// The requested page does not exist.
    #[error("Page {0} not found")]
    PageNotFound(usize),
}

/// Result type for controller operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Errors returned by the document controller.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Field model or configuration error.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Loading or rendering error.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The controller was destroyed.
    #[error("Viewer has been destroyed")]
    Destroyed,

    /// `print` was called without a print pipeline.
    #[error("No print pipeline configured: call set_print_pipeline() first")]
    NoPrintPipeline,

    /// The print pipeline failed.
    #[error("Print failed: {0}")]
    Print(String),
}

impl From<ValidationError> for ViewerError {
    fn from(err: ValidationError) -> Self {
        Self::Sign(SignError::Validation(err))
    }
}
