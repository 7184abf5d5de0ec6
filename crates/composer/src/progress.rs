//! Progress side channel and cancellation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stages of a composition run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Render,
    Embed,
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Render => "render",
            Stage::Embed => "embed",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Receives stage and element events during a run
///
/// Every method defaults to a no-op. Listeners observe; they cannot change
/// what the run does.
pub trait ProgressListener {
    fn on_stage_start(&mut self, _stage: Stage, _total: usize) {}

    fn on_stage_progress(&mut self, _stage: Stage, _done: usize, _total: usize) {}

    fn on_stage_complete(&mut self, _stage: Stage) {}

    fn on_element_processed(&mut self, _element_id: &str, _success: bool) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {}

impl<T: ProgressListener + ?Sized> ProgressListener for &mut T {
    fn on_stage_start(&mut self, stage: Stage, total: usize) {
        (**self).on_stage_start(stage, total)
    }

    fn on_stage_progress(&mut self, stage: Stage, done: usize, total: usize) {
        (**self).on_stage_progress(stage, done, total)
    }

    fn on_stage_complete(&mut self, stage: Stage) {
        (**self).on_stage_complete(stage)
    }

    fn on_element_processed(&mut self, element_id: &str, success: bool) {
        (**self).on_element_processed(element_id, success)
    }
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Option<Arc<AtomicBool>>,
}

impl Cancellation {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self::default()
    }

    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag: Some(flag) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
