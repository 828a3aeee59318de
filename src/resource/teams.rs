//! Teams and their memberships
//!
//! Teams are keyed by display name and addressed remotely by the slug the
//! platform derives from it. A declared team exists when its slug matches a
//! live team's, so case and spacing variants of a name update that team.
//! Membership is upsert-only: declared members are added or have their role
//! changed, undeclared members are kept.

use anyhow::{Context, Result, bail};
use declarative::{
    ApplyContext, ApplyResult, Change, ChangeKind, Reconciler, RemovalPolicy, StateMap,
};
use ghclient::{OrgApi, TeamRequest, TeamRole, team_slug};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A declared team member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub login: String,
    #[serde(default)]
    pub role: TeamRole,
}

/// A declared team; unset fields keep their live value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_setting: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

impl TeamDecl {
    fn parse(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).context("Invalid team descriptor")
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn roles(&self) -> BTreeMap<&str, TeamRole> {
        self.members
            .iter()
            .map(|m| (m.login.as_str(), m.role))
            .collect()
    }

    fn request(&self, name: &str) -> TeamRequest {
        TeamRequest {
            name: name.to_string(),
            description: self.description.clone(),
            privacy: self.privacy.clone(),
            notification_setting: self.notification_setting.clone(),
        }
    }

    fn same_settings(&self, other: &Self) -> bool {
        self.description == other.description
            && self.privacy == other.privacy
            && self.notification_setting == other.notification_setting
    }

    fn sort_members(&mut self) {
        self.members.sort_by(|a, b| a.login.cmp(&b.login));
    }
}

/// Live team a declared name refers to, matched by slug
fn live_name(current: &StateMap, declared: &str) -> Option<String> {
    if current.contains_key(declared) {
        return Some(declared.to_string());
    }
    let slug = team_slug(declared);
    current.keys().find(|name| team_slug(name) == slug).cloned()
}

/// Desired state for the declared teams
///
/// Fails when one team lists the same login twice.
pub fn desired_state(teams: &BTreeMap<String, TeamDecl>) -> Result<StateMap> {
    let mut state = StateMap::new();
    for (name, decl) in teams {
        let mut seen = BTreeSet::new();
        for member in &decl.members {
            if !seen.insert(member.login.as_str()) {
                bail!("Team '{name}' lists member '{}' more than once", member.login);
            }
        }
        state.insert(name.clone(), decl.to_value()?);
    }
    Ok(state)
}

#[derive(Debug)]
pub struct TeamsReconciler<'a> {
    api: &'a dyn OrgApi,
}

impl<'a> TeamsReconciler<'a> {
    pub fn new(api: &'a dyn OrgApi) -> Self {
        Self { api }
    }

    /// Upsert each member whose role differs from `current`
    ///
    /// A failing member is recorded and the rest continue; only a fatal
    /// error stops the loop.
    fn sync_members(
        &self,
        name: &str,
        slug: &str,
        desired: &TeamDecl,
        current: &BTreeMap<&str, TeamRole>,
        ctx: &mut ApplyContext,
    ) -> Result<()> {
        for member in &desired.members {
            if current.get(member.login.as_str()) == Some(&member.role) {
                continue;
            }
            match self
                .api
                .set_team_membership(slug, &member.login, member.role)
            {
                Ok(()) => log::debug!("Set {} as {} of {}", member.login, member.role, name),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => ctx.record_failure(
                    format!("member {} of team {name}", member.login),
                    e.to_string(),
                ),
            }
        }
        Ok(())
    }
}

impl Reconciler for TeamsReconciler<'_> {
    fn category(&self) -> &'static str {
        "teams"
    }

    fn current_state(&self) -> Result<StateMap> {
        let mut state = StateMap::new();
        for team in self.api.list_teams()? {
            let mut members = Vec::new();
            for role in TeamRole::all() {
                let logins = self
                    .api
                    .list_team_members(&team.slug, *role)
                    .with_context(|| format!("Failed to read members of team '{}'", team.name))?;
                members.extend(logins.into_iter().map(|login| MemberDecl {
                    login,
                    role: *role,
                }));
            }

            let decl = TeamDecl {
                description: team.description.filter(|d| !d.is_empty()),
                privacy: team.privacy,
                notification_setting: team.notification_setting,
                members,
            };
            state.insert(team.name, decl.to_value()?);
        }
        Ok(state)
    }

    /// Members sorted by login
    fn canonicalize(&self, value: Value) -> Value {
        match TeamDecl::parse(&value) {
            Ok(mut decl) => {
                decl.sort_members();
                decl.to_value().unwrap_or(value)
            }
            Err(_) => value,
        }
    }

    /// Key declarations by the live team they match, fill undeclared
    /// settings from it and keep its members
    fn merge_desired(&self, current: &StateMap, desired: StateMap) -> StateMap {
        desired
            .into_iter()
            .map(|(declared, value)| {
                let name = live_name(current, &declared).unwrap_or(declared);
                let live = current.get(&name).and_then(|v| TeamDecl::parse(v).ok());
                let (Some(live), Ok(mut decl)) = (live, TeamDecl::parse(&value)) else {
                    return (name, value);
                };

                decl.description = decl.description.or(live.description);
                decl.privacy = decl.privacy.or(live.privacy);
                decl.notification_setting =
                    decl.notification_setting.or(live.notification_setting);

                let declared: BTreeSet<String> =
                    decl.members.iter().map(|m| m.login.clone()).collect();
                decl.members.extend(
                    live.members
                        .into_iter()
                        .filter(|m| !declared.contains(&m.login)),
                );
                decl.sort_members();

                let merged = decl.to_value().unwrap_or(value);
                (name, merged)
            })
            .collect()
    }

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Ignore
    }

    fn apply(&self, change: &Change, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let name = change.key.as_str();
        match change.kind {
            ChangeKind::Add => {
                let desired = TeamDecl::parse(change.require_new_value()?)?;
                let team = self.api.create_team(&desired.request(name))?;
                self.sync_members(name, &team.slug, &desired, &BTreeMap::new(), ctx)?;
                Ok(ApplyResult::Created)
            }
            ChangeKind::Update => {
                let desired = TeamDecl::parse(change.require_new_value()?)?;
                let live = match &change.current_value {
                    Some(value) => TeamDecl::parse(value)?,
                    None => TeamDecl::default(),
                };
                let slug = team_slug(name);
                if !desired.same_settings(&live) {
                    self.api.update_team(&slug, &desired.request(name))?;
                }
                self.sync_members(name, &slug, &desired, &live.roles(), ctx)?;
                Ok(ApplyResult::Modified)
            }
            ChangeKind::Remove => Ok(ApplyResult::Skipped {
                reason: "not declared; left unchanged".to_string(),
            }),
        }
    }

    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        super::is_fatal(error)
    }
}
