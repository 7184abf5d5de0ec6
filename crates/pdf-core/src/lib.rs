//! PDF Core - Low-level PDF manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents
//! - Reading page geometry from the page tree
//! - Registering TrueType and base-14 standard fonts
//! - Drawing text at page coordinates (origin bottom-left)
//! - Touching document metadata
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Color, PdfDocument, StandardFont};
//!
//! let mut doc = PdfDocument::open("contract.pdf")?;
//! doc.add_standard_font(StandardFont::HelveticaBold)?;
//! doc.draw_text(1, "Jane Doe", 100.0, 700.0, "Helvetica-Bold", 14.0, Color::black())?;
//! doc.save("signed.pdf")?;
//! ```

mod document;
mod font;
mod text;

pub use document::{Color, PdfDocument, RegisteredFont};
pub use font::{FontData, FontFace, FontFamilyBuilder, FontStyle, FontWeight, StandardFont};
pub use text::{calculate_x_offset, escape_literal, generate_text_operators, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}
