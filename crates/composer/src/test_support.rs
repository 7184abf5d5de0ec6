//! In-memory document double for unit tests

use crate::document::{DocumentHandle, FontHandle, FontResources, TextMeasure};
use crate::schema::PageGeometry;
use pdf_core::{Color, FontStyle, FontWeight};
use std::collections::HashSet;
use std::sync::Arc;

/// Fixed-advance measurement: every char is `advance` em wide, lines are
/// `height` em tall
pub struct MonoMeasure {
    pub advance: f64,
    pub height: f64,
}

impl TextMeasure for MonoMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f64 {
        text.chars().count() as f64 * self.advance * font_size as f64
    }

    fn text_height(&self, font_size: f32) -> f64 {
        self.height * font_size as f64
    }
}

/// A font half an em wide per char and one em tall
pub fn mono_font(name: &str, weight: FontWeight) -> FontHandle {
    FontHandle::new(
        name,
        name.split('-').next().unwrap_or(name),
        weight,
        FontStyle::Normal,
        Arc::new(MonoMeasure {
            advance: 0.5,
            height: 1.0,
        }),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub page_index: usize,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub font: String,
    pub font_size: f32,
    pub color: Color,
}

pub struct FakeDocument {
    pub pages: Vec<PageGeometry>,
    pub fonts: FontResources,
    pub draws: Vec<DrawCall>,
    /// 1-based draw call numbers that fail
    pub failing_calls: HashSet<usize>,
    pub calls: usize,
    pub finalized: usize,
}

impl FakeDocument {
    /// A document with A4-ish pages and a bold and regular mono font
    pub fn a4(pages: usize) -> Self {
        Self::with_pages(vec![PageGeometry::new(595.0, 842.0); pages])
    }

    pub fn with_pages(pages: Vec<PageGeometry>) -> Self {
        let fonts = [
            mono_font("Mono", FontWeight::Regular),
            mono_font("Mono-Bold", FontWeight::Bold),
        ]
        .into_iter()
        .collect();
        Self {
            pages,
            fonts,
            draws: Vec::new(),
            failing_calls: HashSet::new(),
            calls: 0,
            finalized: 0,
        }
    }

    pub fn without_fonts(mut self) -> Self {
        self.fonts = FontResources::new();
        self
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.failing_calls = calls.iter().copied().collect();
        self
    }
}

impl DocumentHandle for FakeDocument {
    type Error = String;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, page_index: usize) -> Option<PageGeometry> {
        self.pages.get(page_index).copied()
    }

    fn embedded_fonts(&self) -> FontResources {
        self.fonts.clone()
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
    ) -> Result<(), String> {
        self.calls += 1;
        if self.failing_calls.contains(&self.calls) {
            return Err(format!("draw call {} rejected", self.calls));
        }
        self.draws.push(DrawCall {
            page_index,
            content: content.to_string(),
            x,
            y,
            font: font.name().to_string(),
            font_size,
            color,
        });
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), String> {
        self.finalized += 1;
        Ok(())
    }
}
