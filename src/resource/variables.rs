//! Organization Actions variables
//!
//! Variables are text on the wire. Objects and arrays are sent as
//! canonical JSON text and parsed back on read, so declared structure
//! survives a round trip.

use anyhow::Result;
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::OrgApi;
use serde_json::Value;

#[derive(Debug)]
pub struct VariablesReconciler<'a> {
    api: &'a dyn OrgApi,
}

impl<'a> VariablesReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi) -> Self {
        Self { api }
    }

    fn upsert(&self, name: &str, value: &Value) -> Result<ApplyResult> {
        let text = encode(value)?;
        match self.api.get_variable(name) {
            Ok(_) => {
                self.api.update_variable(name, &text)?;
                Ok(ApplyResult::Modified)
            }
            Err(e) if e.is_not_found() => {
                self.api.create_variable(name, &text)?;
                Ok(ApplyResult::Created)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Text sent to the platform for a declared value
pub fn encode(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Structured value for text read back from the platform
pub fn decode(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
        _ => Value::String(raw.to_string()),
    }
}

impl Reconciler for VariablesReconciler<'_> {
    fn category(&self) -> &'static str {
        "variables"
    }

    fn current_state(&self) -> Result<StateMap> {
        Ok(self
            .api
            .list_variables()?
            .into_iter()
            .map(|v| (v.name, decode(&v.value)))
            .collect())
    }

    /// The form a value takes after a round trip through the platform
    ///
    /// Scalars become text, and text holding a JSON object or array reads
    /// back as that structure.
    fn canonicalize(&self, value: Value) -> Value {
        match value {
            Value::Number(_) | Value::Bool(_) | Value::Null => Value::String(value.to_string()),
            Value::String(text) => decode(&text),
            other => other,
        }
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Apply
    }

    fn apply(&self, change: &Change, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match change.kind {
            ChangeKind::Add | ChangeKind::Update => {
                self.upsert(&change.key, change.require_new_value()?)
            }
            ChangeKind::Remove => {
                self.api.delete_variable(&change.key)?;
                Ok(ApplyResult::Removed)
            }
        }
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{apply_all, pending, state};
    use declarative::ReconcileError;
    use ghclient::MockOrg;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_keeps_structure_only_for_composites() {
        assert_eq!(decode(r#"{"b":1,"a":[2]}"#), json!({"a": [2], "b": 1}));
        assert_eq!(decode("[1,2]"), json!([1, 2]));
        assert_eq!(decode("8080"), json!("8080"));
        assert_eq!(decode("eu-west"), json!("eu-west"));
        assert_eq!(decode("{broken"), json!("{broken"));
    }

    #[test]
    fn test_encode_is_canonical() {
        assert_eq!(encode(&json!("plain")).unwrap(), "plain");
        assert_eq!(encode(&json!({"b": 1, "a": 2})).unwrap(), r#"{"a":2,"b":1}"#);
        assert_eq!(encode(&json!(true)).unwrap(), "true");
    }

    #[test]
    fn test_create_update_and_remove() {
        let mock = MockOrg::new("acme")
            .with_variable("OLD", "z")
            .with_variable("EXTRA", "1");
        let reconciler = VariablesReconciler::new(&mock);

        let report = apply_all(&reconciler, state(json!({"NEW": "x", "OLD": "y"}))).unwrap();

        assert!(report.is_success());
        assert_eq!(report.successful.len(), 3);
        assert_eq!(
            mock.mutations(),
            vec![
                "create_variable NEW",
                "update_variable OLD",
                "delete_variable EXTRA"
            ]
        );
        assert_eq!(mock.variable("OLD").as_deref(), Some("y"));
        assert_eq!(mock.variable("EXTRA"), None);
    }

    #[test]
    fn test_composite_values_round_trip_and_converge() {
        let mock = MockOrg::new("acme");
        let reconciler = VariablesReconciler::new(&mock);
        let desired = state(json!({
            "CONFIG": {"regions": ["eu", "us"], "canary": true},
            "PORT": 8080,
        }));

        apply_all(&reconciler, desired.clone()).unwrap();

        assert_eq!(
            mock.variable("CONFIG").as_deref(),
            Some(r#"{"canary":true,"regions":["eu","us"]}"#)
        );
        assert_eq!(mock.variable("PORT").as_deref(), Some("8080"));
        assert_eq!(pending(&reconciler, desired), 0);
    }

    #[test]
    fn test_json_text_converges_after_apply() {
        let mock = MockOrg::new("acme");
        let reconciler = VariablesReconciler::new(&mock);
        let desired = state(json!({"MATRIX": "[1, 2]", "EMPTY": "{}"}));

        apply_all(&reconciler, desired.clone()).unwrap();

        assert_eq!(mock.variable("MATRIX").as_deref(), Some("[1,2]"));
        assert_eq!(mock.variable("EMPTY").as_deref(), Some("{}"));
        assert_eq!(pending(&reconciler, desired), 0);
    }

    #[test]
    fn test_unchanged_variables_are_not_touched() {
        let mock = MockOrg::new("acme").with_variable("REGION", "eu");
        let reconciler = VariablesReconciler::new(&mock);

        let report = apply_all(&reconciler, state(json!({"REGION": "eu"}))).unwrap();

        assert_eq!(report.total(), 0);
        assert!(mock.mutations().is_empty());
    }

    #[test]
    fn test_conflict_fails_only_that_variable() {
        let mock = MockOrg::new("acme").fail_on("create_variable BAD", 422);
        let reconciler = VariablesReconciler::new(&mock);

        let report = apply_all(&reconciler, state(json!({"BAD": "1", "GOOD": "2"}))).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].description.contains("BAD"));
        assert_eq!(report.successful, vec!["add variables 'GOOD'"]);
    }

    #[test]
    fn test_auth_failure_aborts_the_run() {
        let mock = MockOrg::new("acme").fail_on("get_variable A", 401);
        let reconciler = VariablesReconciler::new(&mock);

        let err = apply_all(&reconciler, state(json!({"A": "1", "B": "2"}))).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::Aborted { .. })
        ));
        assert!(!mock.calls().iter().any(|c| c.ends_with(" B")));
    }
}
