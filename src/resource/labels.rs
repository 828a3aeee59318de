//! Repository labels
//!
//! Labels are not organization-wide: the declared set is pushed into every
//! repository whose name matches one of the declared patterns. State is
//! keyed by repository, each value the repository's labels sorted by name.
//! Labels that exist in a repository but are not declared are kept.

use anyhow::{Context, Result, bail};
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::{Label, OrgApi};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Declared labels and the repositories they go to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsDecl {
    /// Regular expressions matched against the whole repository name
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug)]
pub struct LabelsReconciler<'a> {
    api: &'a dyn OrgApi,
    patterns: Vec<Regex>,
    labels: Vec<Label>,
}

impl<'a> LabelsReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi, decl: Option<&LabelsDecl>) -> Result<Self> {
        let decl = decl.cloned().unwrap_or_default();
        let patterns = decl
            .repositories
            .iter()
            .map(|p| {
                Regex::new(&format!("^(?:{p})$"))
                    .with_context(|| format!("Invalid repository pattern '{p}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            api,
            patterns,
            labels: decl.labels.into_iter().map(normalize).collect(),
        })
    }

    /// Whether any pattern matches the repository name
    pub fn matches(&self, repo: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(repo))
    }

    /// Labels of `base` overlaid with `overlay`, by name
    fn overlay(base: Vec<Label>, overlay: &[Label]) -> Vec<Label> {
        let mut by_name: BTreeMap<String, Label> =
            base.into_iter().map(|l| (l.name.clone(), l)).collect();
        for label in overlay {
            by_name.insert(label.name.clone(), label.clone());
        }
        by_name.into_values().collect()
    }
}

fn normalize(label: Label) -> Label {
    Label {
        name: label.name,
        color: label.color.trim_start_matches('#').to_lowercase(),
        description: label.description.filter(|d| !d.is_empty()),
    }
}

fn parse(value: &Value) -> Result<Vec<Label>> {
    let labels: Vec<Label> =
        serde_json::from_value(value.clone()).context("Invalid label list")?;
    Ok(labels.into_iter().map(normalize).collect())
}

fn to_value(mut labels: Vec<Label>) -> Value {
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::to_value(labels).unwrap_or(Value::Array(Vec::new()))
}

impl Reconciler for LabelsReconciler<'_> {
    fn category(&self) -> &'static str {
        "labels"
    }

    fn current_state(&self) -> Result<StateMap> {
        let mut state = StateMap::new();
        for repo in self.api.list_repositories()? {
            if repo.archived || !self.matches(&repo.name) {
                continue;
            }
            let labels = self
                .api
                .list_labels(&repo.name)
                .with_context(|| format!("Failed to read labels of {}", repo.name))?;
            state.insert(repo.name, to_value(labels));
        }
        Ok(state)
    }

    fn canonicalize(&self, value: Value) -> Value {
        match parse(&value) {
            Ok(labels) => to_value(labels),
            Err(_) => value,
        }
    }

    /// Every repository in scope gets its live labels plus the declared ones
    ///
    /// Entries already in `desired` (a restored snapshot) take the place of
    /// the live labels for that repository.
    fn merge_desired(&self, current: &StateMap, desired: StateMap) -> StateMap {
        let mut merged = StateMap::new();
        for (repo, live) in current {
            let live = parse(live).unwrap_or_default();
            let base = match desired.get(repo).map(parse) {
                Some(Ok(wanted)) => Self::overlay(live, &wanted),
                _ => live,
            };
            merged.insert(repo.clone(), to_value(Self::overlay(base, &self.labels)));
        }
        for (repo, wanted) in desired {
            merged.entry(repo).or_insert(wanted);
        }
        merged
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Ignore
    }

    fn describe(&self, change: &Change) -> String {
        format!("{} labels in '{}'", change.kind, change.key)
    }

    /// Upsert each differing label; one failing label does not stop the rest
    fn apply(&self, change: &Change, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if change.kind == ChangeKind::Remove {
            return Ok(ApplyResult::Skipped {
                reason: "not declared; left unchanged".to_string(),
            });
        }

        let repo = change.key.as_str();
        let desired = parse(change.require_new_value()?)?;
        let live: BTreeMap<String, Label> = match &change.current_value {
            Some(value) => parse(value)?
                .into_iter()
                .map(|l| (l.name.clone(), l))
                .collect(),
            None => BTreeMap::new(),
        };

        let mut applied = 0;
        let mut failures = Vec::new();
        for label in &desired {
            let result = match live.get(&label.name) {
                Some(existing) if existing == label => continue,
                Some(_) => self.api.update_label(repo, &label.name, label),
                None => self.api.create_label(repo, label),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => failures.push((format!("label {} in {repo}", label.name), e.to_string())),
            }
        }

        if applied == 0 && !failures.is_empty() {
            let reasons: Vec<String> = failures
                .into_iter()
                .map(|(what, why)| format!("{what}: {why}"))
                .collect();
            bail!("{}", reasons.join("; "));
        }
        for (what, why) in failures {
            ctx.record_failure(what, why);
        }
        Ok(ApplyResult::Modified)
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}
