//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific terminal front-end.

use crate::types::{ApplyResult, Change, FailedEntry};
use anyhow::Result;
use std::collections::VecDeque;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called when a category starts with the number of pending changes
    fn on_category_start(&mut self, category: &str, changes: usize);

    /// Called when starting to apply a single change
    fn on_change_start(&mut self, description: &str);

    /// Called when a change reaches a terminal state
    fn on_change_complete(&mut self, description: &str, result: &ApplyResult);

    /// Called when a category completes
    fn on_category_complete(&mut self, category: &str);
}

/// Confirmation callback for user interaction
///
/// Invoked synchronously once per change; the run cannot proceed past an
/// unanswered confirmation.
pub trait ConfirmCallback {
    /// Ask the user to confirm a change
    ///
    /// # Arguments
    /// * `prompt` - The confirmation prompt to show
    /// * `change` - The change awaiting a decision
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str, change: &Change) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_category_start(&mut self, _category: &str, _changes: usize) {}
    fn on_change_start(&mut self, _description: &str) {}
    fn on_change_complete(&mut self, _description: &str, _result: &ApplyResult) {}
    fn on_category_complete(&mut self, _category: &str) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str, _change: &Change) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str, _change: &Change) -> Result<bool> {
        Ok(false)
    }
}

/// Replays a fixed sequence of answers, then falls back to a default
///
/// Records every prompt it was asked, which makes it useful for asserting
/// which changes reached the confirmation step.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    fallback: bool,
    pub prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback,
            prompts: Vec::new(),
        }
    }
}

impl ConfirmCallback for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str, _change: &Change) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or(self.fallback))
    }
}

/// Context passed to reconciler apply operations
///
/// Sub-operations that fail without failing the whole change (one team
/// member, one repository label) are recorded here and folded into the
/// run report by the executor.
#[derive(Debug, Default)]
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
    failures: Vec<FailedEntry>,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }

    /// Record a failed sub-operation without aborting the change
    pub fn record_failure(&mut self, description: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(FailedEntry {
            description: description.into(),
            reason: reason.into(),
        });
    }

    /// Sub-operation failures recorded so far
    pub fn failures(&self) -> &[FailedEntry] {
        &self.failures
    }

    /// Take the recorded failures, leaving the context empty
    pub fn take_failures(&mut self) -> Vec<FailedEntry> {
        std::mem::take(&mut self.failures)
    }
}
