//! Element rendering
//!
//! Turns an [`AnnotationElement`] into a page-space [`RenderInstruction`]:
//! content is normalized by kind, the percent box is converted to page
//! space, the style is resolved against that box and the draw point is
//! aligned inside it.

use crate::document::FontResources;
use crate::format::{apply_name_case, format_date};
use crate::progress::Cancellation;
use crate::schema::*;
use crate::style::{Adjustment, ComputedStyle, StyleOptions, StyleResolver};
use crate::transform::CoordinateTransformer;
use crate::{ComposeError, Result};
use pdf_core::calculate_x_offset;

/// A fully resolved mark, ready to draw
#[derive(Debug, Clone)]
pub struct RenderInstruction {
    /// Id of the element this was rendered from
    pub id: String,
    pub kind: ElementKind,
    /// 0-based page index
    pub page_index: usize,
    /// Normalized content
    pub content: String,
    /// The element's box in page space
    pub bounds: PixelRect,
    /// Text rectangle; `x`/`y` is the draw point on the baseline
    pub position: PixelRect,
    pub style: ComputedStyle,
    pub adjustments: Vec<Adjustment>,
    pub warnings: Vec<String>,
}

/// An element the renderer could not turn into an instruction
#[derive(Debug)]
pub struct RenderFailure {
    pub element_id: String,
    pub page_index: usize,
    pub error: ComposeError,
}

/// Outcome of rendering a list of elements
#[derive(Debug, Default)]
pub struct RenderBatch {
    pub instructions: Vec<RenderInstruction>,
    pub failures: Vec<RenderFailure>,
    /// Instruction warnings prefixed with their element id
    pub warnings: Vec<String>,
}

/// Renders elements with one fixed set of content and alignment options
#[derive(Debug, Clone, Default)]
pub struct ElementRenderer {
    options: RenderOptions,
    style: StyleResolver,
}

impl ElementRenderer {
    pub fn new(options: RenderOptions, style: StyleResolver) -> Self {
        Self { options, style }
    }

    /// A renderer using the run-wide options of `config`
    pub fn from_config(config: &ComposeConfig) -> Self {
        Self::new(
            config.render_options(),
            StyleResolver::new(StyleOptions::from(config)),
        )
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Normalize content for the element's kind
    ///
    /// Returns the content to draw and, when it differs from the input in
    /// more than surrounding whitespace, the adjustment describing the change.
    pub fn normalize_content(&self, element: &AnnotationElement) -> (String, Option<Adjustment>) {
        let raw = element.content.as_str();
        let normalized = match element.kind {
            ElementKind::Name => apply_name_case(raw.trim(), self.options.name_case),
            // Unparseable dates are drawn exactly as given
            ElementKind::Date => format_date(raw, &self.options.date_format)
                .unwrap_or_else(|| raw.to_string()),
            ElementKind::Text => raw.trim().to_string(),
        };

        let adjustment = (normalized != raw.trim()).then(|| Adjustment::ContentFormatted {
            from: raw.to_string(),
            to: normalized.clone(),
        });
        (normalized, adjustment)
    }

    /// Render one element
    pub fn render(
        &self,
        element: &AnnotationElement,
        fonts: &FontResources,
        transformer: &CoordinateTransformer,
    ) -> Result<RenderInstruction> {
        element.position.validate()?;

        let (content, formatted) = self.normalize_content(element);
        if content.trim().is_empty() {
            return Err(ComposeError::EmptyContent(element.id.clone()));
        }

        let area = transformer.box_to_pixel(element.page_index, &element.position)?;
        // box_to_pixel reports the top edge; instructions carry the bottom edge
        let bounds = area.moved_to(area.x, area.y - area.height);

        let outcome = self.style.resolve(
            &content,
            element.style.requested_font_size,
            element.style.requested_font_family.as_deref(),
            fonts,
            &bounds,
        )?;
        let style = outcome.style;

        let padding = self.style.options().padding;
        let pad_x = bounds.width * padding;
        let pad_y = bounds.height * padding;

        let offset = calculate_x_offset(
            style.text_width,
            bounds.width - 2.0 * pad_x,
            self.options.alignment.into(),
        );
        let x = bounds.x + pad_x + offset;
        let baseline = bounds.top() - pad_y - style.text_height;

        let mut adjustments: Vec<Adjustment> = formatted.into_iter().collect();
        adjustments.extend(outcome.adjustments);

        Ok(RenderInstruction {
            id: element.id.clone(),
            kind: element.kind,
            page_index: element.page_index,
            content,
            bounds,
            position: PixelRect::new(x, baseline, style.text_width, style.text_height),
            style,
            adjustments,
            warnings: outcome.warnings,
        })
    }

    /// Render a list of elements, collecting failures instead of stopping
    pub fn render_batch(
        &self,
        elements: &[&AnnotationElement],
        fonts: &FontResources,
        transformer: &CoordinateTransformer,
        cancel: &Cancellation,
    ) -> RenderBatch {
        render_each(elements, cancel, |element| {
            self.render(element, fonts, transformer)
        })
    }
}

/// Renderers keyed by element kind
#[derive(Debug, Clone)]
pub enum RendererSet {
    /// One renderer for every kind
    Uniform(ElementRenderer),
    /// A renderer per kind, each with its own defaults
    ByKind {
        name: ElementRenderer,
        date: ElementRenderer,
        text: ElementRenderer,
    },
}

impl RendererSet {
    pub fn uniform(config: &ComposeConfig) -> Self {
        RendererSet::Uniform(ElementRenderer::from_config(config))
    }

    /// One renderer per kind: run-wide options with `config.partition_defaults` on top
    pub fn partitioned(config: &ComposeConfig) -> Self {
        let build = |kind| {
            ElementRenderer::new(
                config.render_options_for(kind),
                StyleResolver::new(StyleOptions::from(config)),
            )
        };
        RendererSet::ByKind {
            name: build(ElementKind::Name),
            date: build(ElementKind::Date),
            text: build(ElementKind::Text),
        }
    }

    pub fn for_kind(&self, kind: ElementKind) -> &ElementRenderer {
        match self {
            RendererSet::Uniform(renderer) => renderer,
            RendererSet::ByKind { name, date, text } => match kind {
                ElementKind::Name => name,
                ElementKind::Date => date,
                ElementKind::Text => text,
            },
        }
    }

    pub fn render_batch(
        &self,
        elements: &[&AnnotationElement],
        fonts: &FontResources,
        transformer: &CoordinateTransformer,
        cancel: &Cancellation,
    ) -> RenderBatch {
        render_each(elements, cancel, |element| {
            self.for_kind(element.kind)
                .render(element, fonts, transformer)
        })
    }
}

fn render_each<F>(elements: &[&AnnotationElement], cancel: &Cancellation, render: F) -> RenderBatch
where
    F: Fn(&AnnotationElement) -> Result<RenderInstruction>,
{
    let mut batch = RenderBatch::default();

    for element in elements {
        let result = if cancel.is_cancelled() {
            Err(ComposeError::Cancelled)
        } else {
            render(*element)
        };

        match result {
            Ok(instruction) => {
                batch.warnings.extend(
                    instruction
                        .warnings
                        .iter()
                        .map(|w| format!("{}: {}", instruction.id, w)),
                );
                batch.instructions.push(instruction);
            }
            Err(error) => {
                log::warn!("Failed to render element '{}': {}", element.id, error);
                batch.failures.push(RenderFailure {
                    element_id: element.id.clone(),
                    page_index: element.page_index,
                    error,
                });
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeDocument;
    use crate::DocumentHandle;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn setup(pages: usize) -> (FontResources, CoordinateTransformer) {
        let doc = FakeDocument::a4(pages);
        (doc.embedded_fonts(), CoordinateTransformer::from_document(&doc))
    }

    fn renderer(alignment: TextAlignment) -> ElementRenderer {
        let config = ComposeConfig {
            text_alignment: alignment,
            ..ComposeConfig::default()
        };
        ElementRenderer::from_config(&config)
    }

    #[test]
    fn test_unparseable_date_passes_through() {
        let (fonts, transformer) = setup(1);
        let element = AnnotationElement::new(
            "date-1",
            ElementKind::Date,
            "2024-13-45",
            PercentRect::new(60.0, 80.0, 30.0, 15.0),
            0,
        );

        let instruction = renderer(TextAlignment::Left)
            .render(&element, &fonts, &transformer)
            .unwrap();

        assert_eq!(instruction.content, "2024-13-45");
        assert!(instruction.adjustments.is_empty());
        assert!(close(instruction.bounds.x, 357.0));
        assert!(close(instruction.bounds.top(), 168.4));
        assert!(close(instruction.bounds.width, 178.5));
        assert!(close(instruction.bounds.height, 126.3));
        assert!(close(instruction.bounds.y, 42.1));
    }

    #[test]
    fn test_date_is_reformatted() {
        let (fonts, transformer) = setup(1);
        let config = ComposeConfig {
            date_format: "DD/MM/YYYY".to_string(),
            ..ComposeConfig::default()
        };
        let element = AnnotationElement::new(
            "date-1",
            ElementKind::Date,
            "2024-03-09",
            PercentRect::new(10.0, 10.0, 40.0, 5.0),
            0,
        );

        let instruction = ElementRenderer::from_config(&config)
            .render(&element, &fonts, &transformer)
            .unwrap();

        assert_eq!(instruction.content, "09/03/2024");
        assert_eq!(
            instruction.adjustments[0],
            Adjustment::ContentFormatted {
                from: "2024-03-09".to_string(),
                to: "09/03/2024".to_string()
            }
        );
    }

    #[test]
    fn test_name_case_and_trim() {
        let config = ComposeConfig {
            name_case: crate::NameCase::Upper,
            ..ComposeConfig::default()
        };
        let renderer = ElementRenderer::from_config(&config);
        let element = AnnotationElement::new(
            "n",
            ElementKind::Name,
            "  jane doe ",
            PercentRect::new(10.0, 10.0, 40.0, 5.0),
            0,
        );
        let (content, adjustment) = renderer.normalize_content(&element);
        assert_eq!(content, "JANE DOE");
        assert!(adjustment.is_some());

        let text = AnnotationElement::new(
            "t",
            ElementKind::Text,
            "  approved  ",
            PercentRect::new(10.0, 10.0, 40.0, 5.0),
            0,
        );
        assert_eq!(renderer.normalize_content(&text), ("approved".to_string(), None));
    }

    #[test]
    fn test_blank_content_rejected() {
        let (fonts, transformer) = setup(1);
        let element = AnnotationElement::new(
            "blank",
            ElementKind::Text,
            "   ",
            PercentRect::new(10.0, 10.0, 40.0, 5.0),
            0,
        );
        let err = renderer(TextAlignment::Left)
            .render(&element, &fonts, &transformer)
            .unwrap_err();
        assert!(matches!(err, ComposeError::EmptyContent(id) if id == "blank"));
    }

    #[test]
    fn test_out_of_range_box_rejected_not_clamped() {
        let (fonts, transformer) = setup(1);
        let element = AnnotationElement::new(
            "wide",
            ElementKind::Text,
            "hello",
            PercentRect::new(90.0, 10.0, 20.0, 5.0),
            0,
        );
        let err = renderer(TextAlignment::Left)
            .render(&element, &fonts, &transformer)
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidBounds(_)));
    }

    #[test]
    fn test_alignment_and_baseline() {
        let (fonts, transformer) = setup(1);
        // 595 x 842 page: box is 119 x 84.2 at (59.5, top 757.8)
        let element = AnnotationElement::new(
            "t",
            ElementKind::Text,
            "abcd",
            PercentRect::new(10.0, 10.0, 20.0, 10.0),
            0,
        )
        .with_font_size(10.0);

        let left = renderer(TextAlignment::Left)
            .render(&element, &fonts, &transformer)
            .unwrap();
        // "abcd" at 10pt in the mono test font is 20 x 10
        assert_eq!(left.style.font_size, 10.0);
        assert!(close(left.position.width, 20.0));
        assert!(close(left.position.x, 59.5 + 5.95));
        assert!(close(left.position.y, 757.8 - 4.21 - 10.0));

        let center = renderer(TextAlignment::Center)
            .render(&element, &fonts, &transformer)
            .unwrap();
        assert!(close(center.position.x, 59.5 + 5.95 + (107.1 - 20.0) / 2.0));

        let right = renderer(TextAlignment::Right)
            .render(&element, &fonts, &transformer)
            .unwrap();
        assert!(close(right.position.right(), 59.5 + 119.0 - 5.95));
    }

    #[test]
    fn test_batch_partial_success() {
        let (fonts, transformer) = setup(2);
        let elements: Vec<AnnotationElement> = (0..5)
            .map(|i| {
                AnnotationElement::new(
                    format!("el-{i}"),
                    ElementKind::Text,
                    "hello",
                    PercentRect::new(10.0, 10.0 + i as f64 * 10.0, 40.0, 5.0),
                    if i == 2 { 9 } else { i % 2 },
                )
            })
            .collect();
        let refs: Vec<&AnnotationElement> = elements.iter().collect();

        let batch = renderer(TextAlignment::Left).render_batch(
            &refs,
            &fonts,
            &transformer,
            &Cancellation::never(),
        );

        assert_eq!(batch.instructions.len(), 4);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].element_id, "el-2");
        assert!(matches!(
            batch.failures[0].error,
            ComposeError::InvalidPage { index: 9, page_count: 2 }
        ));
    }

    #[test]
    fn test_batch_stops_rendering_when_cancelled() {
        let (fonts, transformer) = setup(1);
        let element = AnnotationElement::new(
            "a",
            ElementKind::Text,
            "hello",
            PercentRect::new(10.0, 10.0, 40.0, 5.0),
            0,
        );
        let cancel = Cancellation::from_flag(Arc::new(AtomicBool::new(true)));

        let batch = renderer(TextAlignment::Left).render_batch(&[&element], &fonts, &transformer, &cancel);
        assert!(batch.instructions.is_empty());
        assert!(matches!(batch.failures[0].error, ComposeError::Cancelled));
    }

    #[test]
    fn test_partitioned_defaults() {
        let set = RendererSet::partitioned(&ComposeConfig::default());
        assert_eq!(set.for_kind(ElementKind::Name).options().alignment, TextAlignment::Center);
        assert_eq!(set.for_kind(ElementKind::Text).options().alignment, TextAlignment::Left);

        let uniform = RendererSet::uniform(&ComposeConfig::default());
        assert_eq!(uniform.for_kind(ElementKind::Name).options().alignment, TextAlignment::Left);
    }

    #[test]
    fn test_partitioned_keeps_run_formats() {
        let config = ComposeConfig {
            date_format: "DD/MM/YYYY".to_string(),
            name_case: crate::NameCase::Upper,
            ..ComposeConfig::default()
        };
        let set = RendererSet::partitioned(&config);

        let date = set.for_kind(ElementKind::Date).options();
        assert_eq!(date.date_format, "DD/MM/YYYY");
        assert_eq!(date.alignment, TextAlignment::Center);
        assert_eq!(set.for_kind(ElementKind::Name).options().name_case, crate::NameCase::Upper);
    }
}
