//! # ghclient
//!
//! Blocking client for administering a GitHub organization.
//!
//! This crate provides:
//! - The [`OrgApi`] trait covering variables, secrets, member privileges,
//!   rulesets, teams and repository labels
//! - [`GitHubOrg`], the REST implementation over `ureq`
//! - [`MockOrg`], an in-memory organization for tests
//! - [`seal_secret`] for encrypting secret values to the organization key
//!
//! ## Example
//!
//! ```no_run
//! use ghclient::{GitHubOrg, OrgApi};
//!
//! let org = GitHubOrg::new("acme", std::env::var("GITHUB_TOKEN").unwrap());
//! for variable in org.list_variables().unwrap() {
//!     println!("{} = {}", variable.name, variable.value);
//! }
//! ```
//!
//! ## Errors
//!
//! Every call returns [`Error`], whose [`ErrorCategory`] tells callers
//! whether to fall back (`NotFound`), report and continue (`Conflict`,
//! `Network`) or stop the run (`Auth`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod seal;
pub mod types;

pub use backend::github::{DEFAULT_API_BASE, GitHubOrg};
pub use backend::{MockOrg, OrgApi};
pub use error::{Error, ErrorCategory, Result};
pub use seal::seal_secret;
pub use types::{
    Label, PublicKey, Repository, RulesetSummary, Team, TeamRequest, TeamRole, Variable,
    team_slug,
};
