//! Reconciler trait for declarative state management
//!
//! A Reconciler owns one category of remote state. It knows how to read
//! the category's current state and how to converge a single key.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, Change, RemovalPolicy, StateMap};
use anyhow::Result;
use serde_json::Value;
use std::fmt;

/// Core trait for category reconcilers
///
/// Every category in the system implements this trait, which provides:
/// - Identity (category name)
/// - State detection (current state as a key → value map)
/// - Canonicalization so equal states compare equal
/// - Convergence of one change at a time (apply)
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, StateMap};
///
/// #[derive(Debug)]
/// struct Flags { remote: std::cell::RefCell<StateMap> }
///
/// impl Reconciler for Flags {
///     fn category(&self) -> &'static str { "flags" }
///
///     fn current_state(&self) -> anyhow::Result<StateMap> {
///         Ok(self.remote.borrow().clone())
///     }
///
///     fn apply(&self, change: &Change, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         let value = change.require_new_value()?.clone();
///         let existed = self.remote.borrow_mut().insert(change.key.clone(), value).is_some();
///         Ok(if existed { ApplyResult::Modified } else { ApplyResult::Created })
///     }
/// }
/// ```
pub trait Reconciler: fmt::Debug {
    /// Category name, e.g. "variables" or "teams"
    fn category(&self) -> &'static str;

    /// Read the live state of this category
    ///
    /// A category that has never been configured yields an empty map,
    /// not an error.
    fn current_state(&self) -> Result<StateMap>;

    /// Normalize a value before diffing
    ///
    /// Applied to both current and desired values so that representation
    /// differences (member order, omitted defaults) never show up as changes.
    fn canonicalize(&self, value: Value) -> Value {
        value
    }

    /// Combine the declared state with live state before diffing
    ///
    /// Categories that only upsert part of a remote collection (labels
    /// inside a repository) override this to keep undeclared entries.
    fn merge_desired(&self, _current: &StateMap, desired: StateMap) -> StateMap {
        desired
    }

    /// What to do with keys that exist remotely but are not declared
    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Ignore
    }

    /// Human-readable description of a change, used in prompts and reports
    fn describe(&self, change: &Change) -> String {
        format!("{} {} '{}'", change.kind, self.category(), change.key)
    }

    /// Apply one change
    ///
    /// Any reference resolution must complete before the first remote
    /// mutation is issued for the change. Sub-operation failures that
    /// should not fail the whole change go to `ctx.record_failure`.
    fn apply(&self, change: &Change, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// Whether an error must abort the whole run instead of one change
    ///
    /// Used for failures no later call can recover from, such as an
    /// invalid credential.
    fn is_fatal(&self, _error: &anyhow::Error) -> bool {
        false
    }
}

/// A boxed reconciler for type-erased storage
pub type BoxedReconciler<'a> = Box<dyn Reconciler + 'a>;
