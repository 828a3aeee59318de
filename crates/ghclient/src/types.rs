//! Core types for organization administration.
//!
//! These mirror the parts of the platform's REST resources that the
//! reconcilers read and write. Fields the reconcilers never touch are
//! left out and ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An organization-level Actions variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Variable value (always text on the wire).
    pub value: String,
}

/// The organization public key used to seal secret values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Identifier submitted alongside a sealed value.
    pub key_id: String,
    /// Base64-encoded Curve25519 public key.
    pub key: String,
}

/// Ruleset as listed by the organization (without rule details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetSummary {
    /// Numeric ruleset id.
    pub id: u64,
    /// Ruleset name, unique per organization.
    pub name: String,
}

/// A team in the organization directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Numeric team id, used as a bypass actor id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// URL-safe slug derived from the name.
    pub slug: String,
    /// Team description.
    #[serde(default)]
    pub description: Option<String>,
    /// `secret` or `closed`.
    #[serde(default)]
    pub privacy: Option<String>,
    /// `notifications_enabled` or `notifications_disabled`.
    #[serde(default)]
    pub notification_setting: Option<String>,
}

/// Body for creating or updating a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRequest {
    /// Display name.
    pub name: String,
    /// Team description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `secret` or `closed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    /// `notifications_enabled` or `notifications_disabled`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_setting: Option<String>,
}

/// Role of a member inside a team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Regular team member.
    #[default]
    Member,
    /// Team maintainer.
    Maintainer,
}

impl TeamRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Maintainer => "maintainer",
        }
    }

    /// All roles, in listing order.
    #[must_use]
    pub fn all() -> &'static [TeamRole] {
        &[TeamRole::Maintainer, TeamRole::Member]
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Slug the platform derives from a team name.
///
/// Lowercase, with each run of whitespace replaced by a single `-`.
#[must_use]
pub fn team_slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A repository owned by the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository name without the owner.
    pub name: String,
    /// Archived repositories reject label writes.
    #[serde(default)]
    pub archived: bool,
}

/// An issue label inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name, unique per repository.
    pub name: String,
    /// Six-digit hex color without the leading `#`.
    pub color: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}
