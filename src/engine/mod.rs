//! Execution engine for orgsync
//!
//! The engine orchestrates:
//! 1. Planning - Read live state for each managed category
//! 2. Diffing - Compare it against declared (or snapshot) state
//! 3. Executing - Confirm and apply change by change, then report

pub mod differ;
pub mod executor;
pub mod planner;
pub mod restore;

pub use differ::display_plan;
pub use executor::{RunOptions, run};
pub use planner::{Planned, Workload};
pub use restore::restore_scope;
