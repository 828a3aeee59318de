//! Core types for declarative state reconciliation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// State of one category: key → JSON value
pub type StateMap = BTreeMap<String, Value>;

/// Kind of a key-level delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Key present in desired state only
    Add,
    /// Key present in both, values differ
    Update,
    /// Key present in current state only
    Remove,
}

impl ChangeKind {
    /// Single-character marker used in diff output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Update => "~",
            Self::Remove => "-",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A single key-level delta between current and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub key: String,
    pub kind: ChangeKind,
    /// Value in current state (`None` for additions)
    pub current_value: Option<Value>,
    /// Value in desired state (`None` for removals)
    pub new_value: Option<Value>,
}

impl Change {
    pub fn add(key: impl Into<String>, new_value: Value) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Add,
            current_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn update(key: impl Into<String>, current_value: Value, new_value: Value) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Update,
            current_value: Some(current_value),
            new_value: Some(new_value),
        }
    }

    pub fn remove(key: impl Into<String>, current_value: Value) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Remove,
            current_value: Some(current_value),
            new_value: None,
        }
    }

    /// Desired value, or an error naming the key when the change carries none
    pub fn require_new_value(&self) -> anyhow::Result<&Value> {
        self.new_value
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("change for '{}' carries no desired value", self.key))
    }
}

/// What a category does with keys that exist remotely but are not declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Confirm and delete through the reconciler
    Apply,
    /// Leave in place, report as skipped
    Ignore,
    /// Never automated; report as requiring manual action
    ManualAction,
}

/// Result of applying a single change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
    /// Not automated; someone has to act out of band
    ManualAction { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// A change that was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub description: String,
    pub reason: String,
    /// Requires someone to act outside this tool
    pub manual_action: bool,
}

/// A change or sub-operation that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub description: String,
    pub reason: String,
}

/// Aggregated outcome of a reconciliation run
///
/// Every outcome is kept individually so the full run can be enumerated
/// at the end, not just counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub successful: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    /// Changes that turned out to be no-ops at apply time
    pub unchanged: usize,
}

impl ApplyReport {
    /// Record the outcome of one change
    pub fn record(&mut self, description: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.unchanged += 1,
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
                self.successful.push(description.to_string());
            }
            ApplyResult::Failed { error } => self.record_failure(description, error),
            ApplyResult::Skipped { reason } => self.skipped.push(SkippedEntry {
                description: description.to_string(),
                reason: reason.clone(),
                manual_action: false,
            }),
            ApplyResult::ManualAction { reason } => self.skipped.push(SkippedEntry {
                description: description.to_string(),
                reason: reason.clone(),
                manual_action: true,
            }),
        }
    }

    pub fn record_failure(&mut self, description: &str, reason: &str) {
        self.failed.push(FailedEntry {
            description: description.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: ApplyReport) {
        self.successful.extend(other.successful);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.unchanged += other.unchanged;
    }

    /// Check if the run was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Skipped entries that need someone to act out of band
    pub fn manual_actions(&self) -> impl Iterator<Item = &SkippedEntry> {
        self.skipped.iter().filter(|s| s.manual_action)
    }

    /// Total number of recorded outcomes
    pub fn total(&self) -> usize {
        self.successful.len() + self.skipped.len() + self.failed.len() + self.unchanged
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_each_outcome() {
        let mut report = ApplyReport::default();
        report.record("add variables FOO", &ApplyResult::Created);
        report.record("update teams Core", &ApplyResult::Modified);
        report.record(
            "remove secrets OLD",
            &ApplyResult::ManualAction {
                reason: "requires manual action".into(),
            },
        );
        report.record(
            "update rulesets main",
            &ApplyResult::Failed {
                error: "boom".into(),
            },
        );
        report.record("update privileges x", &ApplyResult::NoChange);

        assert_eq!(report.successful.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.manual_actions().count(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.total(), 5);
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_merge() {
        let mut a = ApplyReport::default();
        a.record("one", &ApplyResult::Created);
        let mut b = ApplyReport::default();
        b.record(
            "two",
            &ApplyResult::Skipped {
                reason: "declined".into(),
            },
        );
        a.merge(b);
        assert_eq!(a.successful, vec!["one".to_string()]);
        assert_eq!(a.skipped.len(), 1);
        assert!(!a.skipped[0].manual_action);
        assert!(a.is_success());
    }

    #[test]
    fn test_change_constructors() {
        let change = Change::remove("A", Value::from(1));
        assert_eq!(change.kind, ChangeKind::Remove);
        assert!(change.new_value.is_none());
        assert!(change.require_new_value().is_err());

        let change = Change::update("A", Value::from(5), Value::from(1));
        assert_eq!(change.require_new_value().unwrap(), &Value::from(1));
        assert_eq!(change.kind.symbol(), "~");
        assert_eq!(change.kind.to_string(), "update");
    }
}
