//! Composition runs
//!
//! A run goes Validate -> Render -> Embed -> Finalize over every element,
//! retrying failed embeds against fresh page state.

use crate::document::DocumentHandle;
use crate::embedder::{EmbedOperationResult, PageEmbedState, PageEmbedder, PageStates};
use crate::progress::{Cancellation, NoProgress, ProgressListener, Stage};
use crate::renderer::{ElementRenderer, RenderInstruction, RendererSet};
use crate::schema::{AnnotationElement, ComposeConfig, ElementKind};
use crate::transform::CoordinateTransformer;
use crate::{ComposeError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

/// A problem found by the Validate stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub element_id: String,
    pub message: String,
}

/// Aggregate outcome of one composition run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResult {
    /// True when every element was placed
    pub success: bool,
    /// True when strict validation stopped the run before rendering
    pub aborted: bool,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One result per processed element, in input order
    pub results: Vec<EmbedOperationResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validation_issues: Vec<ValidationIssue>,
    /// Embed passes made, including retries
    pub embed_attempts: usize,
    pub elapsed: Duration,
    /// Successfully placed marks per 0-based page index
    pub page_element_counts: BTreeMap<usize, usize>,
}

impl CompositionResult {
    pub fn result_for(&self, element_id: &str) -> Option<&EmbedOperationResult> {
        self.results.iter().find(|r| r.element_id == element_id)
    }
}

/// Runs the composition pipeline against one document
pub struct Composer<'a> {
    config: ComposeConfig,
    progress: Box<dyn ProgressListener + 'a>,
    cancel: Cancellation,
}

impl<'a> Composer<'a> {
    pub fn new(config: ComposeConfig) -> Self {
        Self {
            config,
            progress: Box::new(NoProgress),
            cancel: Cancellation::never(),
        }
    }

    /// Report stage and element events to `listener`
    pub fn with_progress(mut self, listener: impl ProgressListener + 'a) -> Self {
        self.progress = Box::new(listener);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Check elements against the document without touching it
    pub fn validate<D: DocumentHandle + ?Sized>(
        &self,
        doc: &D,
        elements: &[AnnotationElement],
    ) -> Vec<ValidationIssue> {
        let page_count = doc.page_count();
        let mut seen = HashSet::new();
        let mut issues = Vec::new();

        for element in elements {
            let mut issue = |message: String| {
                issues.push(ValidationIssue {
                    element_id: element.id.clone(),
                    message,
                })
            };

            if !seen.insert(element.id.as_str()) {
                issue("duplicate element id".to_string());
            }
            if element.page_index >= page_count {
                issue(
                    ComposeError::InvalidPage {
                        index: element.page_index,
                        page_count,
                    }
                    .to_string(),
                );
            }
            if element.content.trim().is_empty() {
                issue(ComposeError::EmptyContent(element.id.clone()).to_string());
            }
            if let Err(e) = element.position.validate() {
                issue(e.to_string());
            }
        }

        issues
    }

    /// Compose every element with the run-wide renderer options
    pub fn compose<D: DocumentHandle + ?Sized>(
        &mut self,
        doc: &mut D,
        elements: &[AnnotationElement],
    ) -> CompositionResult {
        let renderers = RendererSet::uniform(&self.config);
        self.run(doc, elements, &renderers, false)
    }

    /// Compose Name elements, then Date, then Text, each kind with the
    /// run-wide renderer options overridden by `partition_defaults`
    ///
    /// Page occupancy is shared across kinds, so earlier kinds keep their
    /// spot and later ones move around them.
    pub fn compose_by_kind<D: DocumentHandle + ?Sized>(
        &mut self,
        doc: &mut D,
        elements: &[AnnotationElement],
    ) -> CompositionResult {
        let renderers = RendererSet::partitioned(&self.config);
        self.run(doc, elements, &renderers, true)
    }

    /// Place a single element without batching or retry
    ///
    /// The element sees an empty page state. Render failures are returned as
    /// errors; embed failures come back as an unsuccessful result.
    pub fn place_one<D: DocumentHandle + ?Sized>(
        &self,
        doc: &mut D,
        element: &AnnotationElement,
    ) -> Result<EmbedOperationResult> {
        let fonts = doc.embedded_fonts();
        let transformer = CoordinateTransformer::from_document(doc);
        let instruction = ElementRenderer::from_config(&self.config).render(element, &fonts, &transformer)?;

        let mut state = PageEmbedState::default();
        let batch = PageEmbedder::new(self.config.enable_overlap_protection).embed_to_page(
            doc,
            element.page_index,
            &[&instruction],
            &mut state,
        );

        batch
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ComposeError::DrawFailure(format!("'{}' produced no result", element.id)))
    }

    fn run<D: DocumentHandle + ?Sized>(
        &mut self,
        doc: &mut D,
        elements: &[AnnotationElement],
        renderers: &RendererSet,
        by_kind: bool,
    ) -> CompositionResult {
        let started = Instant::now();
        let mut result = CompositionResult::default();

        if self.config.enable_validation {
            self.progress.on_stage_start(Stage::Validate, elements.len());
            result.validation_issues = self.validate(doc, elements);
            self.progress.on_stage_complete(Stage::Validate);

            if self.config.strict_validation && !result.validation_issues.is_empty() {
                log::warn!(
                    "Validation found {} issue(s); aborting run",
                    result.validation_issues.len()
                );
                result.aborted = true;
                result.errors = result
                    .validation_issues
                    .iter()
                    .map(|issue| format!("{}: {}", issue.element_id, issue.message))
                    .collect();
                result.elapsed = started.elapsed();
                return result;
            }
        }

        let Composer {
            config,
            progress,
            cancel,
        } = self;
        let progress: &mut dyn ProgressListener = progress.as_mut();

        // Render
        let fonts = doc.embedded_fonts();
        let transformer = CoordinateTransformer::from_document(doc);

        let mut by_page: BTreeMap<usize, Vec<&AnnotationElement>> = BTreeMap::new();
        for element in elements {
            by_page.entry(element.page_index).or_default().push(element);
        }

        progress.on_stage_start(Stage::Render, elements.len());
        let mut instructions: Vec<RenderInstruction> = Vec::new();
        let mut failed: Vec<EmbedOperationResult> = Vec::new();
        let mut rendered = 0;
        for group in by_page.values() {
            let batch = renderers.render_batch(group, &fonts, &transformer, cancel);
            instructions.extend(batch.instructions);
            result.warnings.extend(batch.warnings);
            failed.extend(batch.failures.into_iter().map(|failure| {
                EmbedOperationResult::failure(&failure.element_id, failure.page_index, failure.error)
            }));

            rendered += group.len();
            progress.on_stage_progress(Stage::Render, rendered, elements.len());
        }
        progress.on_stage_complete(Stage::Render);

        // Embed
        progress.on_stage_start(Stage::Embed, instructions.len());
        let embedder = PageEmbedder::new(config.enable_overlap_protection);
        let refs: Vec<&RenderInstruction> = instructions.iter().collect();
        let mut states = PageStates::new();

        let all: Vec<usize> = (0..refs.len()).collect();
        let passes = kind_passes(&refs, &all, by_kind);
        let (mut first, warnings) = embed_passes(&embedder, doc, &refs, passes, &mut states, progress, cancel);
        first.sort_by_key(|(i, _)| *i);
        let mut embedded: Vec<EmbedOperationResult> = first.into_iter().map(|(_, r)| r).collect();
        result.warnings.extend(warnings);
        result.embed_attempts = 1;

        let budget = config.embed_attempt_budget();
        while result.embed_attempts < budget && !cancel.is_cancelled() {
            let pending: Vec<usize> = embedded
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.success)
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }

            log::debug!(
                "Retrying {} failed element(s), attempt {} of {}",
                pending.len(),
                result.embed_attempts + 1,
                budget
            );
            states.clear();
            let passes = kind_passes(&refs, &pending, by_kind);
            let (retried, warnings) = embed_passes(&embedder, doc, &refs, passes, &mut states, progress, cancel);
            result.embed_attempts += 1;

            result.warnings.extend(warnings);
            for (i, r) in retried {
                embedded[i] = r;
            }
        }
        progress.on_stage_complete(Stage::Embed);

        // Restore input order across render failures and embed results
        let mut order: HashMap<&str, usize> = HashMap::new();
        for (i, element) in elements.iter().enumerate() {
            order.entry(element.id.as_str()).or_insert(i);
        }
        let mut results: Vec<EmbedOperationResult> = failed.into_iter().chain(embedded).collect();
        results.sort_by_key(|r| order.get(r.element_id.as_str()).copied().unwrap_or(usize::MAX));

        for r in &results {
            progress.on_element_processed(&r.element_id, r.success);
            if r.success {
                *result.page_element_counts.entry(r.page_index).or_default() += 1;
            } else if let Some(error) = &r.error {
                result.errors.push(format!("{}: {}", r.element_id, error));
            }
        }

        result.processed = results.len();
        result.succeeded = results.iter().filter(|r| r.success).count();
        result.failed = result.processed - result.succeeded;
        result.success = result.failed == 0;
        result.results = results;

        // Finalize
        if config.enable_finalize && !cancel.is_cancelled() {
            progress.on_stage_start(Stage::Finalize, 1);
            if let Err(e) = doc.finalize() {
                log::warn!("Finalize failed: {}", e);
                result.warnings.push(format!("finalize failed: {e}"));
            }
            progress.on_stage_complete(Stage::Finalize);
        }

        result.elapsed = started.elapsed();
        log::info!(
            "Composed {}/{} element(s) on {} page(s) in {:?} ({} embed attempt(s))",
            result.succeeded,
            result.processed,
            result.page_element_counts.len(),
            result.elapsed,
            result.embed_attempts
        );

        result
    }
}

/// Splits `indices` into embed passes: one per kind in `ElementKind::ORDER`
/// when `by_kind` is set, otherwise a single pass
fn kind_passes(refs: &[&RenderInstruction], indices: &[usize], by_kind: bool) -> Vec<Vec<usize>> {
    if !by_kind {
        return vec![indices.to_vec()];
    }
    ElementKind::ORDER
        .iter()
        .map(|&kind| indices.iter().copied().filter(|&i| refs[i].kind == kind).collect::<Vec<_>>())
        .filter(|pass| !pass.is_empty())
        .collect()
}

/// Embeds each pass over the shared page states and pairs every result
/// with its index into `refs`
fn embed_passes<D: DocumentHandle + ?Sized>(
    embedder: &PageEmbedder,
    doc: &mut D,
    refs: &[&RenderInstruction],
    passes: Vec<Vec<usize>>,
    states: &mut PageStates,
    progress: &mut dyn ProgressListener,
    cancel: &Cancellation,
) -> (Vec<(usize, EmbedOperationResult)>, Vec<String>) {
    let mut results = Vec::new();
    let mut warnings = Vec::new();
    for pass in passes {
        let group: Vec<&RenderInstruction> = pass.iter().map(|&i| refs[i]).collect();
        let batch = embedder.embed_all(doc, &group, states, progress, cancel);
        warnings.extend(batch.warnings);
        results.extend(pass.into_iter().zip(batch.results));
    }
    (results, warnings)
}
