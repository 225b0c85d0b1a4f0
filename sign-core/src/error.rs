//! Error types for field and document operations.

use thiserror::Error;

/// Result type for core operations.
pub type SignResult<T> = Result<T, SignError>;

/// Errors that can occur in field and document operations.
#[derive(Debug, Error)]
pub enum SignError {
    /// No document has been loaded, or loading failed.
    #[error("No document loaded: call load() before working with fields")]
    NotLoaded,

    /// The document is loading but its page structure is not built yet.
    #[error("Document is not ready yet: wait for load() to finish before adding fields")]
    NotReady,

    /// A field failed placement validation.
    #[error("Invalid field: {0}")]
    Validation(#[from] ValidationError),

    /// A field with the same id already exists.
    #[error("Field {0} already exists")]
    DuplicateField(crate::field::FieldId),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a field placement is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Page index outside the document.
    #[error("page index {page_index} is out of range (document has {page_count} pages)")]
    PageOutOfRange {
        /// Requested page index (0-based).
        page_index: usize,
        /// Number of pages in the document.
        page_count: usize,
    },

    /// Width or height is zero, negative or not a number.
    #[error("field size must be positive, got {width}x{height}")]
    NonPositiveSize {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// Origin lies left of or below the page.
    #[error("field origin ({x}, {y}) must not be negative")]
    NegativeOrigin {
        /// Requested x.
        x: f64,
        /// Requested y.
        y: f64,
    },

    /// Rect extends past the page edge.
    #[error(
        "field rect ends at ({right}, {top}) which exceeds page bounds {page_width}x{page_height}"
    )]
    OutOfBounds {
        /// Right edge of the rect.
        right: f64,
        /// Top edge of the rect.
        top: f64,
        /// Page width in points.
        page_width: f64,
        /// Page height in points.
        page_height: f64,
    },
}
