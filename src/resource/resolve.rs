//! Team references inside ruleset descriptors
//!
//! Declarations name bypass teams by name (`{"team": "Platform Ops"}`);
//! the platform only accepts `actor_id` + `actor_type`. Resolution runs on
//! the whole descriptor before any remote write, so a missing team never
//! leaves a half-substituted ruleset behind.

use anyhow::{Context, Result};
use declarative::ReconcileError;
use ghclient::{OrgApi, Team, team_slug};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BYPASS_ACTORS: &str = "bypass_actors";

const TEAM_ACTOR: &str = "Team";

fn default_bypass_mode() -> String {
    "always".to_string()
}

/// One entry of a ruleset's `bypass_actors`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassActor {
    #[serde(flatten)]
    pub actor: ActorRef,
    #[serde(default = "default_bypass_mode")]
    pub bypass_mode: String,
}

/// Who is exempt: a team by name, or an actor the platform already knows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActorRef {
    Team {
        team: String,
    },
    Direct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor_id: Option<u64>,
        actor_type: String,
    },
}

/// Teams of the organization, looked up by name or slug
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    teams: Vec<Team>,
}

impl TeamDirectory {
    pub fn new(teams: Vec<Team>) -> Self {
        Self { teams }
    }

    pub fn load(api: &dyn OrgApi) -> Result<Self> {
        let teams = api.list_teams().context("Failed to read the team directory")?;
        Ok(Self::new(teams))
    }

    pub fn find(&self, name: &str) -> Option<&Team> {
        let slug = team_slug(name);
        self.teams
            .iter()
            .find(|t| t.name == name || t.slug == name)
            .or_else(|| self.teams.iter().find(|t| t.slug == slug))
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.teams
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
    }
}

/// Parse the bypass actors of a descriptor; absent means none
pub fn actors(descriptor: &Value) -> Result<Vec<BypassActor>> {
    match descriptor.get(BYPASS_ACTORS) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(list) => serde_json::from_value(list.clone()).context("Invalid bypass_actors"),
    }
}

fn with_actors(mut descriptor: Value, actors: &[BypassActor]) -> Result<Value> {
    if let Value::Object(map) = &mut descriptor {
        map.insert(BYPASS_ACTORS.to_string(), serde_json::to_value(actors)?);
    }
    Ok(descriptor)
}

/// Replace every team reference with the id the platform requires
///
/// Fails with [`ReconcileError::UnresolvableReference`] on the first team
/// missing from the directory; nothing is substituted in that case.
pub fn resolve(descriptor: &Value, directory: &TeamDirectory) -> Result<Value> {
    let mut resolved = Vec::new();
    for entry in actors(descriptor)? {
        let actor = match entry.actor {
            ActorRef::Team { team } => {
                let Some(found) = directory.find(&team) else {
                    return Err(ReconcileError::unresolvable("team", team).into());
                };
                ActorRef::Direct {
                    actor_id: Some(found.id),
                    actor_type: TEAM_ACTOR.to_string(),
                }
            }
            direct @ ActorRef::Direct { .. } => direct,
        };
        resolved.push(BypassActor {
            actor,
            bypass_mode: entry.bypass_mode,
        });
    }

    with_actors(descriptor.clone(), &resolved)
}

/// Spell every team reference the way the directory names the team
///
/// References by slug or by a case or spacing variant of the name then
/// compare equal to live actors. Unknown teams are left for [`resolve`]
/// to report.
pub fn canonical_team_names(descriptor: Value, directory: &TeamDirectory) -> Result<Value> {
    let named: Vec<BypassActor> = actors(&descriptor)?
        .into_iter()
        .map(|entry| {
            let actor = match entry.actor {
                ActorRef::Team { team } => ActorRef::Team {
                    team: directory.find(&team).map(|t| t.name.clone()).unwrap_or(team),
                },
                direct @ ActorRef::Direct { .. } => direct,
            };
            BypassActor {
                actor,
                bypass_mode: entry.bypass_mode,
            }
        })
        .collect();

    with_actors(descriptor, &named)
}

/// Show team actors by name, the way they are declared
///
/// Team ids missing from the directory stay as direct actors.
pub fn render_actors(descriptor: Value, directory: &TeamDirectory) -> Result<Value> {
    let rendered: Vec<BypassActor> = actors(&descriptor)?
        .into_iter()
        .map(|entry| {
            let team = match &entry.actor {
                ActorRef::Direct {
                    actor_id: Some(id),
                    actor_type,
                } if actor_type == TEAM_ACTOR => directory.name_of(*id),
                _ => None,
            };
            match team {
                Some(name) => BypassActor {
                    actor: ActorRef::Team {
                        team: name.to_string(),
                    },
                    bypass_mode: entry.bypass_mode,
                },
                None => entry,
            }
        })
        .collect();

    with_actors(descriptor, &rendered)
}
