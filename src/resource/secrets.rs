//! Organization Actions secrets
//!
//! Secrets are write-only. Live state is the set of names (every value is
//! `null`), plaintexts come from the secret source, and removal is never
//! automated.

use anyhow::Result;
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::{OrgApi, PublicKey, seal_secret};
use serde_json::Value;
use std::cell::RefCell;

use crate::config::SecretSource;

/// Desired-state marker forcing a re-send of an existing secret
const ROTATE: &str = "rotate";

#[derive(Debug)]
pub struct SecretsReconciler<'a> {
    api: &'a dyn OrgApi,
    source: Option<&'a SecretSource>,
    public_key: RefCell<Option<PublicKey>>,
}

impl<'a> SecretsReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi, source: Option<&'a SecretSource>) -> Self {
        Self {
            api,
            source,
            public_key: RefCell::new(None),
        }
    }

    /// Organization public key, fetched once per run
    fn public_key(&self) -> Result<PublicKey> {
        if let Some(key) = self.public_key.borrow().as_ref() {
            return Ok(key.clone());
        }
        let key = self.api.secrets_public_key()?;
        *self.public_key.borrow_mut() = Some(key.clone());
        Ok(key)
    }
}

/// Declared secret names; with `rotate`, every name is marked as changed
pub fn desired_state(source: &SecretSource, rotate: bool) -> StateMap {
    let marker = if rotate {
        Value::String(ROTATE.to_string())
    } else {
        Value::Null
    };
    source
        .names()
        .map(|name| (name.to_string(), marker.clone()))
        .collect()
}

impl Reconciler for SecretsReconciler<'_> {
    fn category(&self) -> &'static str {
        "secrets"
    }

    fn current_state(&self) -> Result<StateMap> {
        Ok(self
            .api
            .list_secret_names()?
            .into_iter()
            .map(|name| (name, Value::Null))
            .collect())
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::ManualAction
    }

    fn apply(&self, change: &Change, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if change.kind == ChangeKind::Remove {
            return Ok(ApplyResult::ManualAction {
                reason: "requires manual action: secret removal is not automated".to_string(),
            });
        }

        let Some(plaintext) = self.source.and_then(|s| s.resolve(&change.key)) else {
            return Ok(ApplyResult::Skipped {
                reason: "no plaintext available in the secret source".to_string(),
            });
        };

        let key = self.public_key()?;
        let sealed = seal_secret(&key.key, &plaintext)?;
        self.api.put_secret(&change.key, &sealed, &key.key_id)?;

        Ok(match change.kind {
            ChangeKind::Add => ApplyResult::Created,
            _ => ApplyResult::Modified,
        })
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}
