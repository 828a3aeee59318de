//! Execution planner - selects categories and reads live state
//!
//! A [`Workload`] owns one reconciler and one desired state per managed
//! category. Planning reads live state once per category; the same reads
//! feed the pre-apply snapshot.

use anyhow::{Context, Result};
use declarative::{BoxedReconciler, CategoryPlan, ExecutionPlan, StateMap};
use ghclient::OrgApi;
use std::collections::BTreeMap;

use crate::config::Declarations;
use crate::progress;
use crate::resource::{self, Category};

struct Entry<'a> {
    category: Category,
    reconciler: BoxedReconciler<'a>,
    desired: StateMap,
}

/// Reconcilers and desired states for the categories of one run, in
/// apply order
pub struct Workload<'a> {
    entries: Vec<Entry<'a>>,
}

/// A plan plus the live state it was diffed against
pub struct Planned<'w> {
    pub plan: ExecutionPlan<'w>,
    /// Category name → live state, as read
    pub current: BTreeMap<String, StateMap>,
}

impl<'a> Workload<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declared state for the selected categories
    ///
    /// Categories without a declaration file are not managed and left out.
    pub fn declared(
        api: &'a dyn OrgApi,
        decls: &'a Declarations,
        only: &[Category],
        rotate_secrets: bool,
    ) -> Result<Self> {
        let mut workload = Self::new();
        for category in Category::selected(only) {
            let Some(desired) = resource::desired_state(category, decls, rotate_secrets)? else {
                log::debug!("{category}: no declaration, not managed");
                continue;
            };
            workload.push(category, resource::reconciler(category, api, decls)?, desired);
        }
        Ok(workload)
    }

    pub fn push(&mut self, category: Category, reconciler: BoxedReconciler<'a>, desired: StateMap) {
        self.entries.push(Entry {
            category,
            reconciler,
            desired,
        });
    }

    pub fn categories(&self) -> Vec<Category> {
        self.entries.iter().map(|e| e.category).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read live state only, for snapshots
    pub fn read_current(&self) -> Result<BTreeMap<String, StateMap>> {
        let mut current = BTreeMap::new();
        for entry in &self.entries {
            current.insert(entry.category.to_string(), read(entry)?);
        }
        Ok(current)
    }

    /// Read live state and diff every category
    pub fn plan(&self) -> Result<Planned<'_>> {
        let mut plan = ExecutionPlan::new();
        let mut current = BTreeMap::new();

        for entry in &self.entries {
            let live = read(entry)?;
            plan.push(CategoryPlan::from_states(
                entry.reconciler.as_ref(),
                live.clone(),
                entry.desired.clone(),
            ));
            current.insert(entry.category.to_string(), live);
        }

        Ok(Planned { plan, current })
    }
}

impl Default for Workload<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn read(entry: &Entry<'_>) -> Result<StateMap> {
    let spinner = progress::spinner(&format!("Reading {}...", entry.category));
    let result = entry
        .reconciler
        .current_state()
        .with_context(|| format!("Failed to read current {}", entry.category));
    progress::finish_clear(&spinner);
    result
}
