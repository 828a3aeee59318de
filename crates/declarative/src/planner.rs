//! Execution planner - builds per-category change plans

use crate::diff::{DiffSummary, compare};
use crate::resource::Reconciler;
use crate::types::{Change, StateMap};
use anyhow::{Context, Result};

/// The diffed changes for one category
pub struct CategoryPlan<'a> {
    pub reconciler: &'a dyn Reconciler,
    pub changes: Vec<Change>,
}

impl<'a> CategoryPlan<'a> {
    /// Read live state and diff it against `desired`
    ///
    /// Both sides are canonicalized by the reconciler first, and the
    /// desired side is merged with live state for partial-upsert categories.
    pub fn prepare(reconciler: &'a dyn Reconciler, desired: StateMap) -> Result<Self> {
        let current = reconciler
            .current_state()
            .with_context(|| format!("Failed to read current {}", reconciler.category()))?;
        Ok(Self::from_states(reconciler, current, desired))
    }

    /// Diff already-read states
    pub fn from_states(reconciler: &'a dyn Reconciler, current: StateMap, desired: StateMap) -> Self {
        let current = canonicalize_all(reconciler, current);
        let desired = canonicalize_all(reconciler, desired);
        let desired = reconciler.merge_desired(&current, desired);
        let changes = compare(&current, &desired);

        log::debug!(
            "{}: {} keys current, {} keys desired, {} changes",
            reconciler.category(),
            current.len(),
            desired.len(),
            changes.len()
        );

        Self {
            reconciler,
            changes,
        }
    }

    pub fn category(&self) -> &'static str {
        self.reconciler.category()
    }
}

fn canonicalize_all(reconciler: &dyn Reconciler, state: StateMap) -> StateMap {
    state
        .into_iter()
        .map(|(k, v)| (k, reconciler.canonicalize(v)))
        .collect()
}

/// An execution plan: categories in the order they will be applied
#[derive(Default)]
pub struct ExecutionPlan<'a> {
    pub categories: Vec<CategoryPlan<'a>>,
}

impl<'a> ExecutionPlan<'a> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a category; categories run in insertion order
    pub fn push(&mut self, category: CategoryPlan<'a>) {
        self.categories.push(category);
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "category" or "category.key"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (category, key) = parse_target(t);
                let categories = self
                    .categories
                    .into_iter()
                    .filter(|c| category.as_deref().is_none_or(|cat| c.category() == cat))
                    .map(|mut c| {
                        if let Some(k) = key.as_deref() {
                            c.changes.retain(|change| change.key.contains(k));
                        }
                        c
                    })
                    .collect();
                Self { categories }
            }
        }
    }

    /// Summary across all categories
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for category in &self.categories {
            summary.merge(&DiffSummary::from_changes(&category.changes));
        }
        summary
    }

    /// Total number of changes in the plan
    pub fn total_changes(&self) -> usize {
        self.categories.iter().map(|c| c.changes.len()).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Parse a target string like "category.key" into (category, key)
///
/// Only the first dot separates; keys may contain dots themselves.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((category, key)) => (Some(category.to_string()), Some(key.to_string())),
    }
}
