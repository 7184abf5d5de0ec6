//! Element, geometry and configuration types

use crate::format::NameCase;
use crate::{ComposeError, Result};
use pdf_core::Align;
use serde::{Deserialize, Serialize};

/// Kind of annotation mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Name,
    Date,
    Text,
}

impl ElementKind {
    /// Processing order used by type-partitioned composition
    pub const ORDER: [ElementKind; 3] = [ElementKind::Name, ElementKind::Date, ElementKind::Text];
}

/// Placement box in percent space (origin top-left, axes 0..=100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PercentRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the box lies inside the page
    ///
    /// Out-of-range boxes are rejected; nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ComposeError::InvalidBounds(format!(
                    "{name} = {value} is outside 0..=100"
                )));
            }
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(ComposeError::InvalidBounds(format!(
                "box {}x{} has no area",
                self.width, self.height
            )));
        }
        if self.x + self.width > 100.0 {
            return Err(ComposeError::InvalidBounds(format!(
                "x + width = {} exceeds 100",
                self.x + self.width
            )));
        }
        if self.y + self.height > 100.0 {
            return Err(ComposeError::InvalidBounds(format!(
                "y + height = {} exceeds 100",
                self.y + self.height
            )));
        }
        Ok(())
    }
}

/// Rectangle in page space (origin bottom-left); `y` is the bottom edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Axis-aligned overlap test; touching edges count as overlapping
    pub fn overlaps(&self, other: &PixelRect) -> bool {
        !(self.right() < other.x
            || other.right() < self.x
            || self.top() < other.y
            || other.top() < self.y)
    }

    /// Whether the rectangle lies within `[0, width] x [0, height]`
    pub fn fits_within(&self, page: &PageGeometry) -> bool {
        const EPSILON: f64 = 1e-6;
        self.x >= -EPSILON
            && self.y >= -EPSILON
            && self.right() <= page.width + EPSILON
            && self.top() <= page.height + EPSILON
    }

    pub fn moved_to(&self, x: f64, y: f64) -> PixelRect {
        PixelRect { x, y, ..*self }
    }
}

/// Per-page dimensions supplied by the host document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Advisory styling requested by the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleHints {
    pub requested_font_size: Option<f32>,
    pub requested_font_family: Option<String>,
}

/// A request to place one text mark on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationElement {
    pub id: String,
    pub kind: ElementKind,
    pub content: String,
    pub position: PercentRect,
    /// 0-based page index
    pub page_index: usize,
    #[serde(default)]
    pub style: StyleHints,
}

impl AnnotationElement {
    pub fn new(
        id: impl Into<String>,
        kind: ElementKind,
        content: impl Into<String>,
        position: PercentRect,
        page_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            position,
            page_index,
            style: StyleHints::default(),
        }
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.style.requested_font_size = Some(size);
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.style.requested_font_family = Some(family.into());
        self
    }
}

/// Horizontal text alignment inside an element's box
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl From<TextAlignment> for Align {
    fn from(alignment: TextAlignment) -> Self {
        match alignment {
            TextAlignment::Left => Align::Left,
            TextAlignment::Center => Align::Center,
            TextAlignment::Right => Align::Right,
        }
    }
}

/// Content and alignment options for one renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub alignment: TextAlignment,
    pub name_case: NameCase,
    pub date_format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            alignment: TextAlignment::Left,
            name_case: NameCase::AsIs,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Options one kind overrides on top of the run-wide ones; unset fields
/// inherit from [`ComposeConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KindOverrides {
    pub alignment: Option<TextAlignment>,
    pub name_case: Option<NameCase>,
    pub date_format: Option<String>,
}

impl KindOverrides {
    pub fn aligned(alignment: TextAlignment) -> Self {
        Self {
            alignment: Some(alignment),
            ..Self::default()
        }
    }

    pub fn apply(&self, base: RenderOptions) -> RenderOptions {
        RenderOptions {
            alignment: self.alignment.unwrap_or(base.alignment),
            name_case: self.name_case.unwrap_or(base.name_case),
            date_format: self.date_format.clone().unwrap_or(base.date_format),
        }
    }
}

/// Per-kind overrides used by type-partitioned composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionDefaults {
    pub name: KindOverrides,
    pub date: KindOverrides,
    pub text: KindOverrides,
}

impl Default for PartitionDefaults {
    fn default() -> Self {
        Self {
            name: KindOverrides::aligned(TextAlignment::Center),
            date: KindOverrides::aligned(TextAlignment::Center),
            text: KindOverrides::aligned(TextAlignment::Left),
        }
    }
}

impl PartitionDefaults {
    pub fn for_kind(&self, kind: ElementKind) -> &KindOverrides {
        match kind {
            ElementKind::Name => &self.name,
            ElementKind::Date => &self.date,
            ElementKind::Text => &self.text,
        }
    }
}

pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Configuration for one composition run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComposeConfig {
    pub enable_validation: bool,
    /// Abort the run before rendering when validation reports any issue
    pub strict_validation: bool,
    pub enable_retry: bool,
    /// Embed attempts allowed after the first one
    pub max_retry_attempts: usize,
    pub enable_overlap_protection: bool,
    pub enable_finalize: bool,
    pub auto_size: bool,
    pub text_alignment: TextAlignment,
    pub date_format: String,
    pub name_case: NameCase,
    pub min_font_size: f32,
    pub max_font_size: f32,
    pub default_font_size: f32,
    pub text_padding_percent: f64,
    pub partition_defaults: PartitionDefaults,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            enable_validation: true,
            strict_validation: false,
            enable_retry: true,
            max_retry_attempts: 3,
            enable_overlap_protection: true,
            enable_finalize: true,
            auto_size: true,
            text_alignment: TextAlignment::Left,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            name_case: NameCase::AsIs,
            min_font_size: 8.0,
            max_font_size: 72.0,
            default_font_size: 12.0,
            text_padding_percent: 5.0,
            partition_defaults: PartitionDefaults::default(),
        }
    }
}

impl ComposeConfig {
    /// Parse a configuration from camelCase JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renderer options for uniform (non-partitioned) composition
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            alignment: self.text_alignment,
            name_case: self.name_case,
            date_format: self.date_format.clone(),
        }
    }

    /// Renderer options for one kind under type-partitioned composition
    pub fn render_options_for(&self, kind: ElementKind) -> RenderOptions {
        self.partition_defaults
            .for_kind(kind)
            .apply(self.render_options())
    }

    /// Total embed attempts a run may make
    pub fn embed_attempt_budget(&self) -> usize {
        if self.enable_retry {
            1 + self.max_retry_attempts
        } else {
            1
        }
    }
}
