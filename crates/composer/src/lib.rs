//! Composer - places annotation marks onto existing document pages
//!
//! This crate provides:
//! - Percent-space to page-space coordinate transforms
//! - Font selection and auto-fit sizing for a target box
//! - Per-kind content normalization (names, dates, free text)
//! - Page embedding with overlap avoidance
//! - A staged composition run (validate, render, embed, finalize) with retry
//!   and progress reporting
//!
//! # Example
//!
//! ```ignore
//! use composer::{AnnotationElement, ComposeConfig, Composer, ElementKind, PercentRect};
//! use pdf_core::{PdfDocument, StandardFont};
//!
//! let mut doc = PdfDocument::open_from_bytes(&bytes)?;
//! doc.add_standard_font(StandardFont::HelveticaBold)?;
//!
//! let elements = vec![AnnotationElement::new(
//!     "signer-name",
//!     ElementKind::Name,
//!     "Jane Doe",
//!     PercentRect::new(10.0, 80.0, 35.0, 5.0),
//!     0,
//! )];
//!
//! let result = Composer::new(ComposeConfig::default()).compose(&mut doc, &elements);
//! assert!(result.success);
//! let signed = doc.to_bytes()?;
//! ```

mod composer;
mod document;
mod embedder;
pub mod format;
mod progress;
mod renderer;
mod schema;
mod style;
mod transform;

#[cfg(test)]
mod test_support;

pub use composer::{CompositionResult, Composer, ValidationIssue};
pub use document::{DocumentHandle, FontHandle, FontResources, TextMeasure};
pub use embedder::{
    EmbedBatch, EmbedOperationResult, OccupiedArea, PageEmbedState, PageEmbedder, PageStates,
    INK_COLOR, RELOCATION_GAP,
};
pub use format::NameCase;
pub use progress::{Cancellation, NoProgress, ProgressListener, Stage};
pub use renderer::{ElementRenderer, RenderBatch, RenderFailure, RenderInstruction, RendererSet};
pub use schema::*;
pub use style::{Adjustment, ComputedStyle, StyleOptions, StyleOutcome, StyleResolver};
pub use transform::{percent_to_pixel, pixel_to_percent, CoordinateTransformer};

use thiserror::Error;

/// Errors that can occur while composing marks
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid page index {index} (document has {page_count} pages)")]
    InvalidPage { index: usize, page_count: usize },

    #[error("No usable font available in the document")]
    NoFontAvailable,

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Element '{0}' has no content")]
    EmptyContent(String),

    #[error("Invalid style: {0}")]
    InvalidStyle(String),

    #[error("Draw failed: {0}")]
    DrawFailure(String),

    #[error("Composition cancelled")]
    Cancelled,

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for composition operations
pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ComposeError::InvalidPage {
            index: 7,
            page_count: 3,
        };
        assert_eq!(err.to_string(), "Invalid page index 7 (document has 3 pages)");
        assert_eq!(
            ComposeError::EmptyContent("sig-1".to_string()).to_string(),
            "Element 'sig-1' has no content"
        );
    }
}
