//! Host document contract
//!
//! The engine draws through [`DocumentHandle`] and measures text through
//! [`TextMeasure`]; `pdf_core::PdfDocument` implements both seams.

use crate::schema::PageGeometry;
use chrono::Utc;
use pdf_core::{Color, FontFace, FontStyle, FontWeight, PdfDocument, PdfError};
use std::fmt;
use std::sync::Arc;

/// Text measurement for one font
pub trait TextMeasure: Send + Sync {
    /// Advance width of `text` in points at `font_size`
    fn text_width(&self, text: &str, font_size: f32) -> f64;

    /// Vertical extent of a line in points at `font_size`
    fn text_height(&self, font_size: f32) -> f64;
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str, font_size: f32) -> f64 {
        self.text_width_points(text, font_size) as f64
    }

    fn text_height(&self, font_size: f32) -> f64 {
        self.line_height_points(font_size) as f64
    }
}

/// A font embedded in (or available to) the host document
#[derive(Clone)]
pub struct FontHandle {
    name: String,
    family: String,
    weight: FontWeight,
    style: FontStyle,
    measure: Arc<dyn TextMeasure>,
}

impl FontHandle {
    pub fn new(
        name: impl Into<String>,
        family: impl Into<String>,
        weight: FontWeight,
        style: FontStyle,
        measure: Arc<dyn TextMeasure>,
    ) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            weight,
            style,
            measure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn text_width(&self, text: &str, font_size: f32) -> f64 {
        self.measure.text_width(text, font_size)
    }

    pub fn text_height(&self, font_size: f32) -> f64 {
        self.measure.text_height(font_size)
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("weight", &self.weight)
            .field("style", &self.style)
            .finish()
    }
}

impl PartialEq for FontHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// The named set of fonts a document exposes
#[derive(Debug, Clone, Default)]
pub struct FontResources {
    fonts: Vec<FontHandle>,
}

impl FontResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle, replacing any handle with the same name
    pub fn insert(&mut self, handle: FontHandle) {
        self.fonts.retain(|f| f.name != handle.name);
        self.fonts.push(handle);
    }

    pub fn get(&self, name: &str) -> Option<&FontHandle> {
        self.fonts.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FontHandle> {
        self.fonts.iter()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl FromIterator<FontHandle> for FontResources {
    fn from_iter<I: IntoIterator<Item = FontHandle>>(iter: I) -> Self {
        let mut resources = FontResources::new();
        for handle in iter {
            resources.insert(handle);
        }
        resources
    }
}

/// An opened, mutable document the engine draws into
///
/// Page indices are 0-based. Implementations are driven sequentially; one
/// composition run owns the handle for its whole duration.
pub trait DocumentHandle {
    type Error: fmt::Display;

    fn page_count(&self) -> usize;

    /// Geometry of a page, or `None` when the index is out of range
    fn page_geometry(&self, page_index: usize) -> Option<PageGeometry>;

    fn embedded_fonts(&self) -> FontResources;

    /// Draw one text run with its baseline starting at `(x, y)` in page space
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        page_index: usize,
        content: &str,
        x: f64,
        y: f64,
        font: &FontHandle,
        font_size: f32,
        color: Color,
    ) -> std::result::Result<(), Self::Error>;

    /// Post-processing hook run by the Finalize stage
    fn finalize(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

impl DocumentHandle for PdfDocument {
    type Error = PdfError;

    fn page_count(&self) -> usize {
        PdfDocument::page_count(self)
    }

    fn page_geometry(&self, page_index: usize) -> Option<PageGeometry> {
        self.page_size(page_index + 1)
            .ok()
            .map(|(width, height)| PageGeometry::new(width, height))
    }

    fn embedded_fonts(&self) -> FontResources {
        self.fonts()
            .map(|(name, font)| {
                let measure: Arc<dyn TextMeasure> = font.face.clone();
                FontHandle::new(name, font.family.as_str(), font.weight, font.style, measure)
            })
            .collect()
    }

    fn draw_text(
        &mut self,
        page_index: usize,
        content: &str,
        x: f64,
        y: f64,
        font: &FontHandle,
        font_size: f32,
        color: Color,
    ) -> std::result::Result<(), PdfError> {
        // page space starts at the MediaBox corner, user space may not
        let (ox, oy) = self.page_origin(page_index + 1)?;
        PdfDocument::draw_text(self, page_index + 1, content, x + ox, y + oy, font.name(), font_size, color)
    }

    fn finalize(&mut self) -> std::result::Result<(), PdfError> {
        self.set_modification_date(Utc::now())
    }
}
