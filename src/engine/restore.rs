//! Restore - a snapshot substituted for the declared state
//!
//! Restore is the ordinary diff-and-apply run with the snapshot as desired
//! state and live state as current. Secrets are restored from the secret
//! source loaded now; snapshot secrets missing there end up skipped.

use anyhow::Result;
use ghclient::OrgApi;

use crate::config::Declarations;
use crate::resource::labels::LabelsDecl;
use crate::resource::{self, Category};
use crate::snapshot::Snapshot;

use super::planner::Workload;

/// Declarations adjusted for restoring `snapshot`
///
/// Every repository the snapshot holds labels for is in scope, and no
/// declared labels are pushed on top of the snapshot.
pub fn restore_scope(decls: &Declarations, snapshot: &Snapshot) -> Declarations {
    let mut scope = decls.clone();
    if let Some(labels) = snapshot.resource_states.get(Category::Labels.as_str()) {
        let mut decl = scope.labels.take().unwrap_or_default();
        decl.repositories
            .extend(labels.keys().map(|repo| regex::escape(repo)));
        scope.labels = Some(LabelsDecl {
            repositories: decl.repositories,
            labels: Vec::new(),
        });
    }
    scope
}

impl<'a> Workload<'a> {
    /// Snapshot states as desired state for the selected categories
    pub fn restore(
        api: &'a dyn OrgApi,
        scope: &'a Declarations,
        snapshot: &Snapshot,
        only: &[Category],
    ) -> Result<Self> {
        for name in snapshot.resource_states.keys() {
            if !Category::ALL.iter().any(|c| c.as_str() == name) {
                log::warn!("Snapshot holds unknown category '{name}', ignoring it");
            }
        }

        let mut workload = Self::new();
        for category in Category::selected(only) {
            let Some(desired) = snapshot.resource_states.get(category.as_str()) else {
                log::debug!("{category}: not in snapshot");
                continue;
            };
            workload.push(
                category,
                resource::reconciler(category, api, scope)?,
                desired.clone(),
            );
        }
        Ok(workload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretSource;
    use declarative::{AutoConfirm, ChangeKind, ExecuteOptions, NoProgress, StateMap, execute};
    use ghclient::{Label, MockOrg};
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    fn snapshot(states: Value) -> Snapshot {
        let states: BTreeMap<String, StateMap> = serde_json::from_value(states).unwrap();
        Snapshot::capture(states)
    }

    #[test]
    fn test_restore_swaps_roles() {
        let mock = MockOrg::new("acme").with_variable("A", "5");
        let snap = snapshot(json!({"variables": {"A": "1", "B": "2"}}));
        let decls = Declarations::default();
        let scope = restore_scope(&decls, &snap);

        let workload = Workload::restore(&mock, &scope, &snap, &[]).unwrap();
        let planned = workload.plan().unwrap();
        let changes = &planned.plan.categories[0].changes;

        assert_eq!(changes.len(), 2);
        let a = changes.iter().find(|c| c.key == "A").unwrap();
        assert_eq!(a.kind, ChangeKind::Update);
        assert_eq!(a.current_value, Some(json!("5")));
        assert_eq!(a.new_value, Some(json!("1")));
        let b = changes.iter().find(|c| c.key == "B").unwrap();
        assert_eq!(b.kind, ChangeKind::Add);
        assert_eq!(b.new_value, Some(json!("2")));

        execute(
            &planned.plan,
            &ExecuteOptions::default(),
            &mut AutoConfirm,
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(mock.variable("A").as_deref(), Some("1"));
        assert_eq!(mock.variable("B").as_deref(), Some("2"));
    }

    #[test]
    fn test_secrets_without_plaintext_are_skipped() {
        let mock = MockOrg::new("acme").with_generated_key();
        let snap = snapshot(json!({"secrets": {"DEPLOY_KEY": null, "NPM_TOKEN": null}}));
        let decls = Declarations {
            secrets: Some(SecretSource::from_entries([("NPM_TOKEN", "npm_abc")])),
            ..Default::default()
        };
        let scope = restore_scope(&decls, &snap);

        let workload = Workload::restore(&mock, &scope, &snap, &[]).unwrap();
        let planned = workload.plan().unwrap();
        let report = execute(
            &planned.plan,
            &ExecuteOptions::default(),
            &mut AutoConfirm,
            &mut NoProgress,
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.successful, vec!["add secrets 'NPM_TOKEN'"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].description.contains("DEPLOY_KEY"));
        assert_eq!(mock.open_secret("NPM_TOKEN").as_deref(), Some("npm_abc"));
    }

    #[test]
    fn test_label_scope_covers_snapshot_repositories() {
        let decls = Declarations {
            labels: Some(LabelsDecl {
                repositories: vec!["algo-.*".to_string()],
                labels: vec![Label {
                    name: "bug".to_string(),
                    color: "d73a4a".to_string(),
                    description: None,
                }],
            }),
            ..Default::default()
        };
        let snap = snapshot(json!({"labels": {"site.io": []}}));

        let scope = restore_scope(&decls, &snap);
        let labels = scope.labels.unwrap();

        assert_eq!(labels.repositories, vec!["algo-.*", r"site\.io"]);
        assert!(labels.labels.is_empty());
    }

    #[test]
    fn test_only_limits_restored_categories() {
        let mock = MockOrg::new("acme");
        let snap = snapshot(json!({
            "variables": {"A": "1"},
            "privileges": {"members_can_create_repositories": false},
        }));
        let decls = Declarations::default();
        let scope = restore_scope(&decls, &snap);

        let workload =
            Workload::restore(&mock, &scope, &snap, &[Category::Privileges]).unwrap();
        assert_eq!(workload.categories(), vec![Category::Privileges]);
    }
}
