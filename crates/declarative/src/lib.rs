//! # Declarative
//!
//! A framework for declarative state reconciliation.
//!
//! This crate provides the core abstractions for comparing a declared
//! desired state against live state, asking for approval change by change,
//! and converging the live state, with failures isolated per change.
//!
//! ## Core Concepts
//!
//! - **StateMap**: One category of state as a key → JSON value map
//! - **Change**: A key-level delta (add, update, remove)
//! - **Reconciler**: Reads and converges one category
//! - **ExecutionPlan**: Diffed changes grouped by category, in apply order
//! - **Executor**: Confirms and applies changes sequentially into an [`ApplyReport`]
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     AutoConfirm, CategoryPlan, ExecuteOptions, ExecutionPlan, NoProgress, execute,
//! };
//!
//! let mut plan = ExecutionPlan::new();
//! plan.push(CategoryPlan::prepare(&variables, declared_variables)?);
//! plan.push(CategoryPlan::prepare(&teams, declared_teams)?);
//!
//! let report = execute(&plan, &ExecuteOptions::default(), &mut AutoConfirm, &mut NoProgress)?;
//! for failure in &report.failed {
//!     eprintln!("{}: {}", failure.description, failure.reason);
//! }
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ConfirmCallback`]: Approves or declines each change
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be driven by an interactive terminal, a
//! headless `--yes` run, or a scripted test without special-casing.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
    ScriptedConfirm,
};
pub use diff::{DiffSummary, compare, values_equal};
pub use error::ReconcileError;
pub use executor::{execute, execute_category};
pub use planner::{CategoryPlan, ExecutionPlan};
pub use resource::{BoxedReconciler, Reconciler};
pub use types::{
    ApplyReport, ApplyResult, Change, ChangeKind, ExecuteOptions, FailedEntry, RemovalPolicy,
    SkippedEntry, StateMap,
};
