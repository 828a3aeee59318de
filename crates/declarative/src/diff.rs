//! Diff computation between current and desired state

use crate::types::{Change, ChangeKind, StateMap};
use serde_json::{Map, Value};

/// Compare current against desired state and produce the change list
///
/// Keys of `desired` come first (additions and updates), followed by keys
/// only present in `current` (removals). Callers must not depend on row
/// order for anything but display.
pub fn compare(current: &StateMap, desired: &StateMap) -> Vec<Change> {
    let mut changes = Vec::new();

    for (key, new_value) in desired {
        match current.get(key) {
            None => changes.push(Change::add(key.clone(), new_value.clone())),
            Some(current_value) if !values_equal(current_value, new_value) => {
                changes.push(Change::update(
                    key.clone(),
                    current_value.clone(),
                    new_value.clone(),
                ));
            }
            Some(_) => {}
        }
    }

    for (key, current_value) in current {
        if !desired.contains_key(key) {
            changes.push(Change::remove(key.clone(), current_value.clone()));
        }
    }

    changes
}

/// Deep structural equality
///
/// - scalars compare by value; numbers by numeric value (`1 == 1.0`)
/// - objects compare order-insensitively; a `null` field equals a missing one
/// - arrays compare element-wise, order-sensitively
/// - differing kinds are never equal
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => false,
    }
}

fn objects_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    let field_matches = |from: &Map<String, Value>, to: &Map<String, Value>| {
        from.iter().all(|(k, v)| match to.get(k) {
            Some(other) => values_equal(v, other),
            None => v.is_null(),
        })
    };
    field_matches(a, b) && field_matches(b, a)
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of keys to add
    pub additions: usize,
    /// Number of keys to update
    pub updates: usize,
    /// Number of keys to remove
    pub removals: usize,
}

impl DiffSummary {
    /// Create a summary from a list of changes
    pub fn from_changes(changes: &[Change]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.kind {
                ChangeKind::Add => summary.additions += 1,
                ChangeKind::Update => summary.updates += 1,
                ChangeKind::Remove => summary.removals += 1,
            }
        }
        summary
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &DiffSummary) {
        self.additions += other.additions;
        self.updates += other.updates;
        self.removals += other.removals;
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.updates + self.removals
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state(value: Value) -> StateMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_compare_classifies_keys() {
        let current = state(json!({"A": 5, "C": "same", "D": true}));
        let desired = state(json!({"A": 1, "B": 2, "C": "same"}));

        let mut changes = compare(&current, &desired);
        changes.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(
            changes,
            vec![
                Change::update("A", json!(5), json!(1)),
                Change::add("B", json!(2)),
                Change::remove("D", json!(true)),
            ]
        );
    }

    #[test]
    fn test_compare_with_itself_is_empty() {
        let s = state(json!({
            "team": {"name": "Core", "members": [{"login": "a", "role": "member"}]},
            "flag": false,
            "nothing": null,
        }));
        assert!(compare(&s, &s).is_empty());
    }

    #[test]
    fn test_compare_never_leaves_key_union() {
        let current = state(json!({"x": 1}));
        let desired = state(json!({"y": 1}));
        let changes = compare(&current, &desired);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.key == "x" || c.key == "y"));
    }

    #[test]
    fn test_restore_shape_swapped_roles() {
        let live = state(json!({"A": 5}));
        let snapshot = state(json!({"A": 1, "B": 2}));
        let changes = compare(&live, &snapshot);
        assert_eq!(
            changes,
            vec![
                Change::update("A", json!(5), json!(1)),
                Change::add("B", json!(2)),
            ]
        );
    }

    #[test]
    fn test_null_presence_at_top_level_still_counts() {
        let current = StateMap::new();
        let desired = state(json!({"SECRET": null}));
        let changes = compare(&current, &desired);
        assert_eq!(changes, vec![Change::add("SECRET", Value::Null)]);
    }

    #[test]
    fn test_values_equal_objects_ignore_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": [1, 2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": [1, 2], "a": 1}"#).unwrap();
        assert!(values_equal(&a, &b));
    }

    #[test]
    fn test_values_equal_arrays_are_ordered() {
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!([1]), &json!([1, 1])));
    }

    #[test]
    fn test_values_equal_null_and_missing_field() {
        assert!(values_equal(
            &json!({"name": "x", "description": null}),
            &json!({"name": "x"})
        ));
        assert!(!values_equal(
            &json!({"name": "x", "description": ""}),
            &json!({"name": "x"})
        ));
    }

    #[test]
    fn test_values_equal_kinds() {
        assert!(!values_equal(&json!("1"), &json!(1)));
        assert!(!values_equal(&json!([]), &json!({})));
        assert!(!values_equal(&Value::Null, &json!(false)));
        assert!(!values_equal(&json!({"a": 1}), &json!("{\"a\":1}")));
    }

    #[test]
    fn test_values_equal_numbers() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!(2)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
    }

    #[test]
    fn test_diff_summary() {
        let changes = vec![
            Change::add("a", json!(1)),
            Change::add("b", json!(1)),
            Change::update("c", json!(1), json!(2)),
            Change::remove("d", json!(1)),
        ];
        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.additions, 2);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_changes());
        assert!(!DiffSummary::default().has_changes());
    }
}
