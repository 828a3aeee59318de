//! Organization member privileges
//!
//! Privileges are a fixed set of writable organization settings. Only the
//! flags listed in [`KNOWN_FLAGS`] are read or written; every other
//! setting the platform returns is outside this category.

use anyhow::{Result, bail};
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::OrgApi;
use serde_json::Map;

/// Writable member-privilege settings
pub const KNOWN_FLAGS: &[&str] = &[
    "default_repository_permission",
    "members_can_create_repositories",
    "members_can_create_public_repositories",
    "members_can_create_private_repositories",
    "members_can_create_internal_repositories",
    "members_can_create_pages",
    "members_can_create_public_pages",
    "members_can_create_private_pages",
    "members_can_fork_private_repositories",
    "web_commit_signoff_required",
    "has_organization_projects",
    "has_repository_projects",
];

pub fn is_known(flag: &str) -> bool {
    KNOWN_FLAGS.contains(&flag)
}

#[derive(Debug)]
pub struct PrivilegesReconciler<'a> {
    api: &'a dyn OrgApi,
}

impl<'a> PrivilegesReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi) -> Self {
        Self { api }
    }
}

impl Reconciler for PrivilegesReconciler<'_> {
    fn category(&self) -> &'static str {
        "privileges"
    }

    fn current_state(&self) -> Result<StateMap> {
        Ok(self
            .api
            .get_settings()?
            .into_iter()
            .filter(|(flag, _)| is_known(flag))
            .collect())
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Ignore
    }

    fn apply(&self, change: &Change, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if change.kind == ChangeKind::Remove {
            return Ok(ApplyResult::Skipped {
                reason: "not declared; left unchanged".to_string(),
            });
        }
        if !is_known(&change.key) {
            bail!(
                "'{}' is not a writable member privilege (known: {})",
                change.key,
                KNOWN_FLAGS.join(", ")
            );
        }

        let mut patch = Map::new();
        patch.insert(change.key.clone(), change.require_new_value()?.clone());
        self.api.update_settings(&patch)?;

        Ok(match change.kind {
            ChangeKind::Add => ApplyResult::Created,
            _ => ApplyResult::Modified,
        })
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}
