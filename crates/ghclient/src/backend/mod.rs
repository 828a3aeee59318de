//! Backend trait and implementations for organization administration.
//!
//! This module provides the [`OrgApi`] trait, the remote state reader and
//! writer every reconciler talks to. The primary implementation is
//! [`github::GitHubOrg`] for the GitHub REST API.
//!
//! # Testing
//!
//! Use [`MockOrg`] for testing without network access:
//!
//! ```
//! use ghclient::backend::{MockOrg, OrgApi};
//! use ghclient::TeamRole;
//!
//! let mock = MockOrg::new("acme")
//!     .with_team("Platform Ops")
//!     .with_member("platform-ops", "alice", TeamRole::Maintainer);
//!
//! let teams = mock.list_teams().unwrap();
//! assert_eq!(teams[0].slug, "platform-ops");
//! assert_eq!(
//!     mock.list_team_members("platform-ops", TeamRole::Maintainer).unwrap(),
//!     vec!["alice".to_string()]
//! );
//! ```

pub mod github;

use crate::error::{Error, Result};
use crate::types::{
    Label, PublicKey, Repository, RulesetSummary, Team, TeamRequest, TeamRole, Variable,
    team_slug,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crypto_box::SecretKey;
use crypto_box::aead::OsRng;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Remote state reader and writer for one organization.
///
/// Every method is a single blocking call (or a sequence of paginated
/// calls); nothing here retries.
pub trait OrgApi: Send + Sync + std::fmt::Debug {
    /// Organization login this client administers.
    fn org(&self) -> &str;

    /// List organization Actions variables.
    fn list_variables(&self) -> Result<Vec<Variable>>;

    /// Fetch one variable.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the variable does not exist.
    fn get_variable(&self, name: &str) -> Result<Variable>;

    /// Create a variable visible to all repositories.
    fn create_variable(&self, name: &str, value: &str) -> Result<()>;

    /// Update an existing variable.
    fn update_variable(&self, name: &str, value: &str) -> Result<()>;

    /// Delete a variable.
    fn delete_variable(&self, name: &str) -> Result<()>;

    /// List organization secret names. Values are never readable.
    fn list_secret_names(&self) -> Result<Vec<String>>;

    /// Fetch the public key secret values must be sealed to.
    fn secrets_public_key(&self) -> Result<PublicKey>;

    /// Create or replace a secret with an already sealed value.
    fn put_secret(&self, name: &str, encrypted_value: &str, key_id: &str) -> Result<()>;

    /// Read organization settings (member privileges live here).
    fn get_settings(&self) -> Result<Map<String, Value>>;

    /// Patch organization settings with the given fields.
    fn update_settings(&self, patch: &Map<String, Value>) -> Result<()>;

    /// List organization rulesets.
    fn list_rulesets(&self) -> Result<Vec<RulesetSummary>>;

    /// Fetch a ruleset with its conditions, rules and bypass actors.
    fn get_ruleset(&self, id: u64) -> Result<Value>;

    /// Create a ruleset, returning its id.
    fn create_ruleset(&self, body: &Value) -> Result<u64>;

    /// Replace a ruleset.
    fn update_ruleset(&self, id: u64, body: &Value) -> Result<()>;

    /// Delete a ruleset.
    fn delete_ruleset(&self, id: u64) -> Result<()>;

    /// List teams in the organization directory.
    fn list_teams(&self) -> Result<Vec<Team>>;

    /// Create a team.
    fn create_team(&self, team: &TeamRequest) -> Result<Team>;

    /// Update a team addressed by slug.
    fn update_team(&self, slug: &str, team: &TeamRequest) -> Result<Team>;

    /// List logins of a team's members holding `role`.
    fn list_team_members(&self, slug: &str, role: TeamRole) -> Result<Vec<String>>;

    /// Add a member to a team or change their role.
    fn set_team_membership(&self, slug: &str, login: &str, role: TeamRole) -> Result<()>;

    /// List repositories owned by the organization.
    fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// List labels of a repository.
    fn list_labels(&self, repo: &str) -> Result<Vec<Label>>;

    /// Create a label in a repository.
    fn create_label(&self, repo: &str, label: &Label) -> Result<()>;

    /// Update the label currently named `name`.
    fn update_label(&self, repo: &str, name: &str, label: &Label) -> Result<()>;
}

/// Mock organization for testing without network access.
///
/// Holds the organization in memory, records every call as a short
/// `"operation args"` string, and can be told to fail specific calls
/// with an HTTP status.
#[derive(Debug, Clone, Default)]
pub struct MockOrg {
    org: String,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    variables: BTreeMap<String, String>,
    secrets: BTreeMap<String, String>,
    public_key: Option<PublicKey>,
    secret_key: Option<[u8; 32]>,
    settings: Map<String, Value>,
    rulesets: BTreeMap<u64, Value>,
    teams: Vec<Team>,
    memberships: BTreeMap<String, BTreeMap<String, TeamRole>>,
    repositories: Vec<Repository>,
    labels: BTreeMap<String, Vec<Label>>,
    next_id: u64,
    calls: Vec<String>,
    failures: HashMap<String, u16>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

const WRITE_PREFIXES: &[&str] = &["create_", "update_", "delete_", "put_", "set_"];

impl MockOrg {
    /// Create an empty mock organization.
    #[must_use]
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            state: Arc::new(Mutex::new(MockState {
                next_id: 100,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Record a call and fail it if a failure was configured.
    fn call(&self, call: String) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        let status = state.failures.get(&call).copied();
        state.calls.push(call.clone());
        match status {
            Some(status) => Err(Error::from_status(status, call)),
            None => Ok(state),
        }
    }

    /// Make the call recorded as `call` fail with an HTTP status.
    #[must_use]
    pub fn fail_on(self, call: impl Into<String>, status: u16) -> Self {
        self.lock().failures.insert(call.into(), status);
        self
    }

    /// Add a variable.
    #[must_use]
    pub fn with_variable(self, name: &str, value: &str) -> Self {
        self.lock()
            .variables
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Add a secret (value is opaque).
    #[must_use]
    pub fn with_secret(self, name: &str) -> Self {
        self.lock()
            .secrets
            .insert(name.to_string(), String::from("sealed"));
        self
    }

    /// Configure the secrets public key.
    #[must_use]
    pub fn with_public_key(self, key: PublicKey) -> Self {
        self.lock().public_key = Some(key);
        self
    }

    /// Generate a keypair and serve its public half as the secrets key.
    ///
    /// Values stored through [`OrgApi::put_secret`] can then be read back
    /// with [`MockOrg::open_secret`].
    #[must_use]
    pub fn with_generated_key(self) -> Self {
        let secret_key = SecretKey::generate(&mut OsRng);
        let public_key = PublicKey {
            key_id: "mock-key".to_string(),
            key: STANDARD.encode(secret_key.public_key().as_bytes()),
        };
        self.lock().secret_key = Some(secret_key.to_bytes());
        self.with_public_key(public_key)
    }

    /// Set an organization setting.
    #[must_use]
    pub fn with_setting(self, key: &str, value: Value) -> Self {
        self.lock().settings.insert(key.to_string(), value);
        self
    }

    /// Add a ruleset; `body` must carry a `name`.
    #[must_use]
    pub fn with_ruleset(self, body: Value) -> Self {
        {
            let mut state = self.lock();
            let id = state.next_id();
            state.rulesets.insert(id, with_id(body, id));
        }
        self
    }

    /// Add a team, deriving its slug from the name.
    #[must_use]
    pub fn with_team(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            let id = state.next_id();
            let slug = team_slug(name);
            state.memberships.entry(slug.clone()).or_default();
            state.teams.push(Team {
                id,
                name: name.to_string(),
                slug,
                description: None,
                privacy: Some("closed".to_string()),
                notification_setting: Some("notifications_enabled".to_string()),
            });
        }
        self
    }

    /// Add a member to an existing team.
    #[must_use]
    pub fn with_member(self, slug: &str, login: &str, role: TeamRole) -> Self {
        self.lock()
            .memberships
            .entry(slug.to_string())
            .or_default()
            .insert(login.to_string(), role);
        self
    }

    /// Add a repository with no labels.
    #[must_use]
    pub fn with_repository(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            state.repositories.push(Repository {
                name: name.to_string(),
                archived: false,
            });
            state.labels.entry(name.to_string()).or_default();
        }
        self
    }

    /// Add an archived repository.
    #[must_use]
    pub fn with_archived_repository(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            state.repositories.push(Repository {
                name: name.to_string(),
                archived: true,
            });
            state.labels.entry(name.to_string()).or_default();
        }
        self
    }

    /// Add a label to a repository.
    #[must_use]
    pub fn with_label(self, repo: &str, label: Label) -> Self {
        self.lock()
            .labels
            .entry(repo.to_string())
            .or_default()
            .push(label);
        self
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls that would have mutated the organization.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| WRITE_PREFIXES.iter().any(|p| c.starts_with(p)))
            .collect()
    }

    /// Current value of a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<String> {
        self.lock().variables.get(name).cloned()
    }

    /// Sealed value stored for a secret.
    #[must_use]
    pub fn secret(&self, name: &str) -> Option<String> {
        self.lock().secrets.get(name).cloned()
    }

    /// Decrypt a stored secret with the generated key.
    #[must_use]
    pub fn open_secret(&self, name: &str) -> Option<String> {
        let state = self.lock();
        let key = SecretKey::from(state.secret_key?);
        let sealed = STANDARD.decode(state.secrets.get(name)?).ok()?;
        let opened = key.unseal(&sealed).ok()?;
        String::from_utf8(opened).ok()
    }

    /// Current organization settings.
    #[must_use]
    pub fn settings(&self) -> Map<String, Value> {
        self.lock().settings.clone()
    }

    /// Stored ruleset with the given name.
    #[must_use]
    pub fn ruleset(&self, name: &str) -> Option<Value> {
        self.lock()
            .rulesets
            .values()
            .find(|r| r.get("name").and_then(Value::as_str) == Some(name))
            .cloned()
    }

    /// Team with the given slug.
    #[must_use]
    pub fn team(&self, slug: &str) -> Option<Team> {
        self.lock().teams.iter().find(|t| t.slug == slug).cloned()
    }

    /// Members of a team with their roles.
    #[must_use]
    pub fn members(&self, slug: &str) -> BTreeMap<String, TeamRole> {
        self.lock()
            .memberships
            .get(slug)
            .cloned()
            .unwrap_or_default()
    }

    /// Labels of a repository.
    #[must_use]
    pub fn labels(&self, repo: &str) -> Vec<Label> {
        self.lock().labels.get(repo).cloned().unwrap_or_default()
    }
}

fn with_id(mut body: Value, id: u64) -> Value {
    if let Value::Object(map) = &mut body {
        map.insert("id".to_string(), Value::from(id));
    }
    body
}

fn ruleset_name(body: &Value) -> String {
    body.get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Lowercase, whitespace runs collapsed to a single `-`.
impl OrgApi for MockOrg {
    fn org(&self) -> &str {
        &self.org
    }

    fn list_variables(&self) -> Result<Vec<Variable>> {
        let state = self.call("list_variables".to_string())?;
        Ok(state
            .variables
            .iter()
            .map(|(name, value)| Variable {
                name: name.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn get_variable(&self, name: &str) -> Result<Variable> {
        let state = self.call(format!("get_variable {name}"))?;
        state
            .variables
            .get(name)
            .map(|value| Variable {
                name: name.to_string(),
                value: value.clone(),
            })
            .ok_or_else(|| Error::NotFound {
                resource: format!("variable {name}"),
            })
    }

    fn create_variable(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.call(format!("create_variable {name}"))?;
        if state.variables.contains_key(name) {
            return Err(Error::from_status(409, format!("variable {name}")));
        }
        state.variables.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn update_variable(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.call(format!("update_variable {name}"))?;
        match state.variables.get_mut(name) {
            Some(existing) => {
                *existing = value.to_string();
                Ok(())
            }
            None => Err(Error::from_status(404, format!("variable {name}"))),
        }
    }

    fn delete_variable(&self, name: &str) -> Result<()> {
        let mut state = self.call(format!("delete_variable {name}"))?;
        state
            .variables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::from_status(404, format!("variable {name}")))
    }

    fn list_secret_names(&self) -> Result<Vec<String>> {
        let state = self.call("list_secret_names".to_string())?;
        Ok(state.secrets.keys().cloned().collect())
    }

    fn secrets_public_key(&self) -> Result<PublicKey> {
        let state = self.call("secrets_public_key".to_string())?;
        state
            .public_key
            .clone()
            .ok_or_else(|| Error::from_status(404, "secrets public key"))
    }

    fn put_secret(&self, name: &str, encrypted_value: &str, _key_id: &str) -> Result<()> {
        let mut state = self.call(format!("put_secret {name}"))?;
        state
            .secrets
            .insert(name.to_string(), encrypted_value.to_string());
        Ok(())
    }

    fn get_settings(&self) -> Result<Map<String, Value>> {
        let state = self.call("get_settings".to_string())?;
        Ok(state.settings.clone())
    }

    fn update_settings(&self, patch: &Map<String, Value>) -> Result<()> {
        let keys: Vec<&str> = patch.keys().map(String::as_str).collect();
        let mut state = self.call(format!("update_settings {}", keys.join(",")))?;
        for (key, value) in patch {
            state.settings.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn list_rulesets(&self) -> Result<Vec<RulesetSummary>> {
        let state = self.call("list_rulesets".to_string())?;
        Ok(state
            .rulesets
            .iter()
            .map(|(id, body)| RulesetSummary {
                id: *id,
                name: ruleset_name(body),
            })
            .collect())
    }

    fn get_ruleset(&self, id: u64) -> Result<Value> {
        let state = self.call(format!("get_ruleset {id}"))?;
        state
            .rulesets
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::from_status(404, format!("ruleset {id}")))
    }

    fn create_ruleset(&self, body: &Value) -> Result<u64> {
        let name = ruleset_name(body);
        let mut state = self.call(format!("create_ruleset {name}"))?;
        if state.rulesets.values().any(|r| ruleset_name(r) == name) {
            return Err(Error::from_status(422, format!("ruleset {name}")));
        }
        let id = state.next_id();
        state.rulesets.insert(id, with_id(body.clone(), id));
        Ok(id)
    }

    fn update_ruleset(&self, id: u64, body: &Value) -> Result<()> {
        let mut state = self.call(format!("update_ruleset {id}"))?;
        if !state.rulesets.contains_key(&id) {
            return Err(Error::from_status(404, format!("ruleset {id}")));
        }
        state.rulesets.insert(id, with_id(body.clone(), id));
        Ok(())
    }

    fn delete_ruleset(&self, id: u64) -> Result<()> {
        let mut state = self.call(format!("delete_ruleset {id}"))?;
        state
            .rulesets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::from_status(404, format!("ruleset {id}")))
    }

    fn list_teams(&self) -> Result<Vec<Team>> {
        let state = self.call("list_teams".to_string())?;
        Ok(state.teams.clone())
    }

    fn create_team(&self, team: &TeamRequest) -> Result<Team> {
        let mut state = self.call(format!("create_team {}", team.name))?;
        let slug = team_slug(&team.name);
        if state.teams.iter().any(|t| t.slug == slug) {
            return Err(Error::from_status(422, format!("team {}", team.name)));
        }
        let created = Team {
            id: state.next_id(),
            name: team.name.clone(),
            slug: slug.clone(),
            description: team.description.clone(),
            privacy: team.privacy.clone().or_else(|| Some("secret".to_string())),
            notification_setting: team
                .notification_setting
                .clone()
                .or_else(|| Some("notifications_enabled".to_string())),
        };
        state.teams.push(created.clone());
        state.memberships.entry(slug).or_default();
        Ok(created)
    }

    fn update_team(&self, slug: &str, team: &TeamRequest) -> Result<Team> {
        let mut state = self.call(format!("update_team {slug}"))?;
        let existing = state
            .teams
            .iter_mut()
            .find(|t| t.slug == slug)
            .ok_or_else(|| Error::from_status(404, format!("team {slug}")))?;
        existing.name = team.name.clone();
        if team.description.is_some() {
            existing.description = team.description.clone();
        }
        if team.privacy.is_some() {
            existing.privacy = team.privacy.clone();
        }
        if team.notification_setting.is_some() {
            existing.notification_setting = team.notification_setting.clone();
        }
        Ok(existing.clone())
    }

    fn list_team_members(&self, slug: &str, role: TeamRole) -> Result<Vec<String>> {
        let state = self.call(format!("list_team_members {slug} {role}"))?;
        let members = state
            .memberships
            .get(slug)
            .ok_or_else(|| Error::from_status(404, format!("team {slug}")))?;
        Ok(members
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(login, _)| login.clone())
            .collect())
    }

    fn set_team_membership(&self, slug: &str, login: &str, role: TeamRole) -> Result<()> {
        let mut state = self.call(format!("set_team_membership {slug} {login}"))?;
        let members = state
            .memberships
            .get_mut(slug)
            .ok_or_else(|| Error::from_status(404, format!("team {slug}")))?;
        members.insert(login.to_string(), role);
        Ok(())
    }

    fn list_repositories(&self) -> Result<Vec<Repository>> {
        let state = self.call("list_repositories".to_string())?;
        Ok(state.repositories.clone())
    }

    fn list_labels(&self, repo: &str) -> Result<Vec<Label>> {
        let state = self.call(format!("list_labels {repo}"))?;
        state
            .labels
            .get(repo)
            .cloned()
            .ok_or_else(|| Error::from_status(404, format!("repository {repo}")))
    }

    fn create_label(&self, repo: &str, label: &Label) -> Result<()> {
        let mut state = self.call(format!("create_label {repo} {}", label.name))?;
        let labels = state
            .labels
            .get_mut(repo)
            .ok_or_else(|| Error::from_status(404, format!("repository {repo}")))?;
        if labels.iter().any(|l| l.name == label.name) {
            return Err(Error::from_status(422, format!("label {}", label.name)));
        }
        labels.push(label.clone());
        Ok(())
    }

    fn update_label(&self, repo: &str, name: &str, label: &Label) -> Result<()> {
        let mut state = self.call(format!("update_label {repo} {name}"))?;
        let existing = state
            .labels
            .get_mut(repo)
            .and_then(|labels| labels.iter_mut().find(|l| l.name == name))
            .ok_or_else(|| Error::from_status(404, format!("label {name} in {repo}")))?;
        *existing = label.clone();
        Ok(())
    }
}
