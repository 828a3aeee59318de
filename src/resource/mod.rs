//! Category reconcilers for organization state
//!
//! Every managed category is a [`declarative::Reconciler`] over a
//! [`ghclient::OrgApi`]:
//! - Identity (category name, fixed apply order)
//! - State detection (live state as a key → JSON value map)
//! - Convergence of one key at a time, with its own removal policy

use anyhow::Result;
use clap::ValueEnum;
use declarative::{BoxedReconciler, StateMap};
use ghclient::OrgApi;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Declarations;

pub mod labels;
pub mod privileges;
pub mod resolve;
pub mod rulesets;
pub mod secrets;
pub mod teams;
pub mod variables;

pub use labels::LabelsReconciler;
pub use privileges::PrivilegesReconciler;
pub use rulesets::RulesetsReconciler;
pub use secrets::SecretsReconciler;
pub use teams::TeamsReconciler;
pub use variables::VariablesReconciler;

/// A managed category of organization state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Variables,
    Secrets,
    Privileges,
    Rulesets,
    Teams,
    Labels,
}

impl Category {
    /// Every category, in apply order
    ///
    /// Teams come after rulesets, so a ruleset bypassing a team declared in
    /// the same run fails to resolve until the next run.
    pub const ALL: [Category; 6] = [
        Category::Variables,
        Category::Secrets,
        Category::Privileges,
        Category::Rulesets,
        Category::Teams,
        Category::Labels,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variables => "variables",
            Self::Secrets => "secrets",
            Self::Privileges => "privileges",
            Self::Rulesets => "rulesets",
            Self::Teams => "teams",
            Self::Labels => "labels",
        }
    }

    /// Categories selected by `--only`, in apply order; empty means all
    pub fn selected(only: &[Category]) -> Vec<Category> {
        Self::ALL
            .into_iter()
            .filter(|c| only.is_empty() || only.contains(c))
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an error chain carries a failure no later call can recover from
pub fn is_fatal(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<ghclient::Error>()
            .is_some_and(ghclient::Error::is_fatal)
    })
}

/// Build the reconciler for a category
pub fn reconciler<'a>(
    category: Category,
    api: &'a dyn OrgApi,
    decls: &'a Declarations,
) -> Result<BoxedReconciler<'a>> {
    Ok(match category {
        Category::Variables => Box::new(VariablesReconciler::new(api)),
        Category::Secrets => Box::new(SecretsReconciler::new(api, decls.secrets.as_ref())),
        Category::Privileges => Box::new(PrivilegesReconciler::new(api)),
        Category::Rulesets => Box::new(RulesetsReconciler::new(api)),
        Category::Teams => Box::new(TeamsReconciler::new(api)),
        Category::Labels => Box::new(LabelsReconciler::new(api, decls.labels.as_ref())?),
    })
}

/// Declared desired state for a category, `None` when it is not managed
pub fn desired_state(
    category: Category,
    decls: &Declarations,
    rotate_secrets: bool,
) -> Result<Option<StateMap>> {
    Ok(match category {
        Category::Variables => decls.variables.clone(),
        Category::Secrets => decls
            .secrets
            .as_ref()
            .map(|source| secrets::desired_state(source, rotate_secrets)),
        Category::Privileges => decls.privileges.clone(),
        Category::Rulesets => decls.rulesets.clone(),
        Category::Teams => decls.teams.as_ref().map(teams::desired_state).transpose()?,
        // Labels derive their desired state from the repositories in scope
        Category::Labels => decls.labels.as_ref().map(|_| StateMap::new()),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use declarative::{
        ApplyReport, AutoConfirm, CategoryPlan, ExecuteOptions, ExecutionPlan, NoProgress,
        Reconciler, StateMap, execute,
    };

    /// Diff `desired` against live state and apply everything
    pub(crate) fn apply_all(
        reconciler: &dyn Reconciler,
        desired: StateMap,
    ) -> anyhow::Result<ApplyReport> {
        let mut plan = ExecutionPlan::new();
        plan.push(CategoryPlan::prepare(reconciler, desired)?);
        execute(
            &plan,
            &ExecuteOptions::default(),
            &mut AutoConfirm,
            &mut NoProgress,
        )
    }

    /// Changes a fresh diff would produce
    pub(crate) fn pending(reconciler: &dyn Reconciler, desired: StateMap) -> usize {
        CategoryPlan::prepare(reconciler, desired)
            .unwrap()
            .changes
            .len()
    }

    /// Build a state map from a JSON object literal
    pub(crate) fn state(value: serde_json::Value) -> StateMap {
        match value {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            other => panic!("expected an object, got {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order() {
        let names: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec!["variables", "secrets", "privileges", "rulesets", "teams", "labels"]
        );
    }

    #[test]
    fn test_selected_keeps_apply_order() {
        assert_eq!(Category::selected(&[]).len(), 6);
        assert_eq!(
            Category::selected(&[Category::Labels, Category::Variables]),
            vec![Category::Variables, Category::Labels]
        );
    }

    #[test]
    fn test_is_fatal_finds_auth_failure_in_chain() {
        let auth = anyhow::Error::from(ghclient::Error::from_status(401, "GET /orgs/acme"))
            .context("Failed to read current teams");
        assert!(is_fatal(&auth));

        let conflict = anyhow::Error::from(ghclient::Error::from_status(422, "POST /x"));
        assert!(!is_fatal(&conflict));
        assert!(!is_fatal(&anyhow::anyhow!("plain failure")));
    }

    #[test]
    fn test_unmanaged_categories_have_no_desired_state() {
        let decls = Declarations::default();
        for category in Category::ALL {
            assert!(desired_state(category, &decls, false).unwrap().is_none());
        }
    }
}
