//! Organization rulesets
//!
//! Rulesets are keyed by name. Live rulesets are read in full and reduced
//! to the fields a declaration can carry; team bypass actors are shown by
//! team name so declared and live state compare directly.

use anyhow::{Context, Result, anyhow};
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::OrgApi;
use serde_json::{Map, Value};
use std::cell::RefCell;

use super::resolve::{self, BYPASS_ACTORS, TeamDirectory};

/// Descriptor fields compared and sent; everything else the platform
/// returns (id, source, links, timestamps) is dropped on read
const FIELDS: [&str; 5] = ["target", "enforcement", "conditions", "rules", BYPASS_ACTORS];

#[derive(Debug)]
pub struct RulesetsReconciler<'a> {
    api: &'a dyn OrgApi,
    directory: RefCell<Option<TeamDirectory>>,
}

impl<'a> RulesetsReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi) -> Self {
        Self {
            api,
            directory: RefCell::new(None),
        }
    }

    /// Team directory, read once per run
    fn directory(&self) -> Result<TeamDirectory> {
        if let Some(directory) = self.directory.borrow().as_ref() {
            return Ok(directory.clone());
        }
        let directory = TeamDirectory::load(self.api)?;
        *self.directory.borrow_mut() = Some(directory.clone());
        Ok(directory)
    }

    /// Remote id of the ruleset with this name
    fn find_id(&self, name: &str) -> Result<Option<u64>> {
        Ok(self
            .api
            .list_rulesets()?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.id))
    }
}

fn project(body: &Value) -> Value {
    let map: Map<String, Value> = FIELDS
        .iter()
        .filter_map(|field| body.get(*field).map(|v| ((*field).to_string(), v.clone())))
        .collect();
    Value::Object(map)
}

impl Reconciler for RulesetsReconciler<'_> {
    fn category(&self) -> &'static str {
        "rulesets"
    }

    fn current_state(&self) -> Result<StateMap> {
        let summaries = self.api.list_rulesets()?;
        if summaries.is_empty() {
            return Ok(StateMap::new());
        }

        let directory = self.directory()?;
        let mut state = StateMap::new();
        for summary in summaries {
            let body = self
                .api
                .get_ruleset(summary.id)
                .with_context(|| format!("Failed to read ruleset '{}'", summary.name))?;
            state.insert(
                summary.name,
                resolve::render_actors(project(&body), &directory)?,
            );
        }
        Ok(state)
    }

    /// Drops the name (it is the key) and fills the actor defaults
    fn canonicalize(&self, value: Value) -> Value {
        let Value::Object(mut map) = value else {
            return value;
        };
        map.remove("name");
        map.remove("id");

        let actors = resolve::actors(&Value::Object(map.clone()))
            .ok()
            .and_then(|actors| serde_json::to_value(actors).ok());
        match actors {
            Some(actors) => {
                map.insert(BYPASS_ACTORS.to_string(), actors);
            }
            None => {
                map.entry(BYPASS_ACTORS).or_insert_with(|| Value::Array(Vec::new()));
            }
        }
        Value::Object(map)
    }

    /// Team references spelled as the live directory names them
    ///
    /// Only a directory already read for live state is used; with no live
    /// rulesets every declared one is an add anyway.
    fn merge_desired(&self, _current: &StateMap, desired: StateMap) -> StateMap {
        let directory = self.directory.borrow();
        let Some(directory) = directory.as_ref() else {
            return desired;
        };
        desired
            .into_iter()
            .map(|(name, value)| {
                let named = resolve::canonical_team_names(value.clone(), directory).unwrap_or(value);
                (name, named)
            })
            .collect()
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Apply
    }

    fn apply(&self, change: &Change, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if change.kind == ChangeKind::Remove {
            let id = self
                .find_id(&change.key)?
                .ok_or_else(|| anyhow!("ruleset '{}' no longer exists", change.key))?;
            self.api.delete_ruleset(id)?;
            return Ok(ApplyResult::Removed);
        }

        // Every reference resolves before the first write for this ruleset
        let mut body = resolve::resolve(change.require_new_value()?, &self.directory()?)?;
        if let Value::Object(map) = &mut body {
            map.insert("name".to_string(), Value::String(change.key.clone()));
        }

        match self.find_id(&change.key)? {
            Some(id) => {
                self.api.update_ruleset(id, &body)?;
                Ok(ApplyResult::Modified)
            }
            None => {
                self.api.create_ruleset(&body)?;
                Ok(ApplyResult::Created)
            }
        }
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}
