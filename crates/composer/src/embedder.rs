//! Page embedding
//!
//! Applies render instructions to a document: validation against the page,
//! overlap avoidance against marks already placed on the same page, the
//! draw call itself and per-page bookkeeping.

use crate::document::{DocumentHandle, FontResources};
use crate::progress::{Cancellation, ProgressListener, Stage};
use crate::renderer::RenderInstruction;
use crate::schema::{PageGeometry, PixelRect};
use crate::style::Adjustment;
use crate::ComposeError;
use pdf_core::Color;
use serde::Serialize;
use std::collections::BTreeMap;

/// Gap left between a relocated mark and the mark it collided with
pub const RELOCATION_GAP: f64 = 5.0;

/// Ink used for every mark
pub const INK_COLOR: Color = Color::black();

/// Rectangle taken by a placed mark
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedArea {
    pub rect: PixelRect,
    pub element_id: String,
}

/// Per-page bookkeeping for one embed pass
#[derive(Debug, Clone, Default)]
pub struct PageEmbedState {
    /// Marks placed on the page so far
    pub placed: usize,
    pub occupied: Vec<OccupiedArea>,
}

impl PageEmbedState {
    /// First recorded area overlapping `rect`
    pub fn first_collision(&self, rect: &PixelRect) -> Option<&OccupiedArea> {
        self.occupied.iter().find(|area| area.rect.overlaps(rect))
    }

    fn record(&mut self, rect: PixelRect, element_id: &str) {
        self.placed += 1;
        self.occupied.push(OccupiedArea {
            rect,
            element_id: element_id.to_string(),
        });
    }
}

/// Page states keyed by 0-based page index, created lazily
pub type PageStates = BTreeMap<usize, PageEmbedState>;

/// Outcome of embedding one element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOperationResult {
    pub element_id: String,
    pub page_index: usize,
    pub success: bool,
    /// Applied text rectangle after any relocation
    pub position: Option<PixelRect>,
    pub font_size: Option<f32>,
    pub adjustments: Vec<Adjustment>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl EmbedOperationResult {
    /// A failed result for an element that never reached the page
    pub fn failure(element_id: &str, page_index: usize, error: impl ToString) -> Self {
        Self {
            element_id: element_id.to_string(),
            page_index,
            success: false,
            position: None,
            font_size: None,
            adjustments: Vec::new(),
            warnings: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn rejected(instruction: &RenderInstruction, error: ComposeError) -> Self {
        log::warn!("Failed to embed element '{}': {}", instruction.id, error);
        Self {
            adjustments: instruction.adjustments.clone(),
            warnings: instruction.warnings.clone(),
            ..Self::failure(&instruction.id, instruction.page_index, error)
        }
    }
}

/// Results of an embed pass, in instruction order
#[derive(Debug, Clone, Default)]
pub struct EmbedBatch {
    pub results: Vec<EmbedOperationResult>,
    /// Page-level warnings such as unresolved overlaps
    pub warnings: Vec<String>,
}

impl EmbedBatch {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Draws render instructions into a document
#[derive(Debug, Clone, Copy)]
pub struct PageEmbedder {
    overlap_protection: bool,
}

impl Default for PageEmbedder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PageEmbedder {
    pub fn new(overlap_protection: bool) -> Self {
        Self { overlap_protection }
    }

    /// Embed instructions that all target `page_index`
    ///
    /// A failing instruction never stops the ones after it.
    pub fn embed_to_page<D: DocumentHandle + ?Sized>(
        &self,
        doc: &mut D,
        page_index: usize,
        instructions: &[&RenderInstruction],
        state: &mut PageEmbedState,
    ) -> EmbedBatch {
        let mut batch = EmbedBatch::default();
        let page = doc.page_geometry(page_index);
        let fonts = doc.embedded_fonts();

        for instruction in instructions {
            let result = match page {
                Some(_) if instruction.page_index != page_index => EmbedOperationResult::rejected(
                    instruction,
                    ComposeError::InvalidPage {
                        index: instruction.page_index,
                        page_count: doc.page_count(),
                    },
                ),
                Some(page) => {
                    self.embed_one(doc, &page, &fonts, instruction, state, &mut batch.warnings)
                }
                None => EmbedOperationResult::rejected(
                    instruction,
                    ComposeError::InvalidPage {
                        index: page_index,
                        page_count: doc.page_count(),
                    },
                ),
            };
            batch.results.push(result);
        }

        batch
    }

    /// Embed instructions across pages
    ///
    /// Instructions are grouped by page and pages are processed in ascending
    /// order; results come back in the order of `instructions`. Cancellation
    /// is checked between pages.
    pub fn embed_all<D: DocumentHandle + ?Sized>(
        &self,
        doc: &mut D,
        instructions: &[&RenderInstruction],
        states: &mut PageStates,
        progress: &mut dyn ProgressListener,
        cancel: &Cancellation,
    ) -> EmbedBatch {
        let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, instruction) in instructions.iter().enumerate() {
            by_page.entry(instruction.page_index).or_default().push(i);
        }

        let total = instructions.len();
        let mut done = 0;
        let mut slots: Vec<Option<EmbedOperationResult>> = vec![None; total];
        let mut warnings = Vec::new();

        for (page_index, indices) in by_page {
            if cancel.is_cancelled() {
                for i in indices {
                    let instruction = instructions[i];
                    slots[i] = Some(EmbedOperationResult::rejected(
                        instruction,
                        ComposeError::Cancelled,
                    ));
                }
                continue;
            }

            let group: Vec<&RenderInstruction> = indices.iter().map(|&i| instructions[i]).collect();
            // pages that do not exist get no state; embed_to_page rejects them
            let page_batch = if doc.page_geometry(page_index).is_some() {
                let state = states.entry(page_index).or_default();
                self.embed_to_page(doc, page_index, &group, state)
            } else {
                self.embed_to_page(doc, page_index, &group, &mut PageEmbedState::default())
            };

            warnings.extend(page_batch.warnings);
            for (i, result) in indices.into_iter().zip(page_batch.results) {
                slots[i] = Some(result);
            }

            done += group.len();
            progress.on_stage_progress(Stage::Embed, done, total);
        }

        EmbedBatch {
            results: slots.into_iter().flatten().collect(),
            warnings,
        }
    }

    fn embed_one<D: DocumentHandle + ?Sized>(
        &self,
        doc: &mut D,
        page: &PageGeometry,
        fonts: &FontResources,
        instruction: &RenderInstruction,
        state: &mut PageEmbedState,
        page_warnings: &mut Vec<String>,
    ) -> EmbedOperationResult {
        if let Err(error) = validate(instruction, page, fonts) {
            return EmbedOperationResult::rejected(instruction, error);
        }

        let mut adjustments = instruction.adjustments.clone();
        let mut warnings = instruction.warnings.clone();
        let mut rect = instruction.position;

        if self.overlap_protection {
            match relocate(&instruction.position, state, page) {
                Placement::Clear => {}
                Placement::Moved(moved) => {
                    log::debug!(
                        "Relocated '{}' from ({:.1}, {:.1}) to ({:.1}, {:.1})",
                        instruction.id,
                        rect.x,
                        rect.y,
                        moved.x,
                        moved.y
                    );
                    adjustments.push(Adjustment::Relocated {
                        from: (rect.x, rect.y),
                        to: (moved.x, moved.y),
                    });
                    rect = moved;
                }
                Placement::Blocked(other) => {
                    let warning = format!(
                        "page {}: '{}' overlaps '{}' and no free position was found",
                        instruction.page_index + 1,
                        instruction.id,
                        other
                    );
                    log::warn!("{}", warning);
                    page_warnings.push(warning.clone());
                    warnings.push(warning);
                }
            }
        }

        let drawn = doc.draw_text(
            instruction.page_index,
            &instruction.content,
            rect.x,
            rect.y,
            &instruction.style.font,
            instruction.style.font_size,
            INK_COLOR,
        );
        if let Err(e) = drawn {
            return EmbedOperationResult {
                adjustments,
                warnings,
                ..EmbedOperationResult::rejected(
                    instruction,
                    ComposeError::DrawFailure(e.to_string()),
                )
            };
        }

        state.record(rect, &instruction.id);

        EmbedOperationResult {
            element_id: instruction.id.clone(),
            page_index: instruction.page_index,
            success: true,
            position: Some(rect),
            font_size: Some(instruction.style.font_size),
            adjustments,
            warnings,
            error: None,
        }
    }
}

fn validate(
    instruction: &RenderInstruction,
    page: &PageGeometry,
    fonts: &FontResources,
) -> crate::Result<()> {
    if instruction.content.trim().is_empty() {
        return Err(ComposeError::EmptyContent(instruction.id.clone()));
    }

    let size = instruction.style.font_size;
    if !size.is_finite() || size <= 0.0 {
        return Err(ComposeError::InvalidStyle(format!("font size {size} is not positive")));
    }
    let font = instruction.style.font.name();
    if fonts.get(font).is_none() {
        return Err(ComposeError::InvalidStyle(format!(
            "font '{font}' is not available in the document"
        )));
    }

    for (what, rect) in [("position", &instruction.position), ("bounds", &instruction.bounds)] {
        if !rect.fits_within(page) {
            return Err(ComposeError::InvalidBounds(format!(
                "{what} ({:.1}, {:.1}, {:.1} x {:.1}) is outside the {:.1} x {:.1} page",
                rect.x, rect.y, rect.width, rect.height, page.width, page.height
            )));
        }
    }

    Ok(())
}

enum Placement {
    Clear,
    Moved(PixelRect),
    /// Id of an area that could not be avoided
    Blocked(String),
}

/// Find a spot for `rect` that avoids every occupied area
///
/// Each collision first tries a shift to the right of the colliding area,
/// then a shift below it. The moved rectangle is checked again, at most once
/// per occupied area plus one.
fn relocate(rect: &PixelRect, state: &PageEmbedState, page: &PageGeometry) -> Placement {
    let mut candidate = *rect;

    for _ in 0..=state.occupied.len() {
        let Some(hit) = state.first_collision(&candidate) else {
            return if candidate == *rect {
                Placement::Clear
            } else {
                Placement::Moved(candidate)
            };
        };

        let right = candidate.moved_to(hit.rect.right() + RELOCATION_GAP, candidate.y);
        if right.right() <= page.width {
            candidate = right;
            continue;
        }

        let down = candidate.moved_to(candidate.x, hit.rect.y - RELOCATION_GAP - candidate.height);
        if down.y >= 0.0 {
            candidate = down;
            continue;
        }

        return Placement::Blocked(hit.element_id.clone());
    }

    match state.first_collision(&candidate) {
        None => Placement::Moved(candidate),
        Some(hit) => Placement::Blocked(hit.element_id.clone()),
    }
}
