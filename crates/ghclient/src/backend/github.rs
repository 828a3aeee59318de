//! GitHub REST backend.
//!
//! This module provides the [`GitHubOrg`] implementation of [`OrgApi`]
//! over GitHub's organization endpoints.
//!
//! # Rate Limiting
//!
//! Authenticated requests are limited to 5000 per hour. List endpoints
//! are paginated at 100 items per page, so a run costs roughly one request
//! per category plus one per change.

use crate::backend::OrgApi;
use crate::error::{Error, Result};
use crate::types::{
    Label, PublicKey, Repository, RulesetSummary, Team, TeamRequest, TeamRole, Variable,
};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Default public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Items requested per page on list endpoints.
const PER_PAGE: usize = 100;

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("orgsync/", env!("CARGO_PKG_VERSION"));

/// HTTP verbs that carry a JSON body.
#[derive(Debug, Clone, Copy)]
enum Verb {
    Post,
    Patch,
    Put,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
        }
    }
}

/// GitHub organization backend.
///
/// # Example
///
/// ```no_run
/// use ghclient::backend::github::GitHubOrg;
/// use ghclient::backend::OrgApi;
///
/// let org = GitHubOrg::new("acme", "ghp_example");
/// let teams = org.list_teams().unwrap();
/// println!("Found {} teams", teams.len());
/// ```
pub struct GitHubOrg {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// GitHub API base URL.
    api_base: String,
    /// Organization login.
    org: String,
    /// Bearer token.
    token: String,
}

impl std::fmt::Debug for GitHubOrg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubOrg")
            .field("api_base", &self.api_base)
            .field("org", &self.org)
            .finish_non_exhaustive()
    }
}

impl GitHubOrg {
    /// Create a backend for `org` against the public API.
    #[must_use]
    pub fn new(org: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_api_base(org, token, DEFAULT_API_BASE)
    }

    /// Create a backend with a custom API base (Enterprise Server, testing).
    #[must_use]
    pub fn with_api_base(
        org: impl Into<String>,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            org: org.into(),
            token: token.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn org_path(&self, rest: &str) -> String {
        format!("/orgs/{}{}", self.org, rest)
    }

    fn label_path(&self, repo: &str, name: Option<&str>) -> String {
        let base = format!("/repos/{}/{}/labels", self.org, urlencoding::encode(repo));
        match name {
            Some(name) => format!("{base}/{}", urlencoding::encode(name)),
            None => base,
        }
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resource = format!("GET {path}");
        log::debug!("{resource}");
        self.authorize(self.agent.get(&self.url(path)))
            .call()
            .map_err(|e| Error::from_request(e, &resource))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::InvalidResponse(format!("{resource}: {e}")))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let resource = format!("DELETE {path}");
        log::debug!("{resource}");
        self.authorize(self.agent.delete(&self.url(path)))
            .call()
            .map_err(|e| Error::from_request(e, &resource))?;
        Ok(())
    }

    fn write<B: Serialize>(
        &self,
        verb: Verb,
        path: &str,
        body: &B,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let resource = format!("{} {path}", verb.as_str());
        log::debug!("{resource}");
        let url = self.url(path);
        let request = match verb {
            Verb::Post => self.agent.post(&url),
            Verb::Patch => self.agent.patch(&url),
            Verb::Put => self.agent.put(&url),
        };
        self.authorize(request)
            .send_json(body)
            .map_err(|e| Error::from_request(e, &resource))
    }

    fn write_json<B: Serialize, T: DeserializeOwned>(
        &self,
        verb: Verb,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.write(verb, path, body)?
            .body_mut()
            .read_json()
            .map_err(|e| Error::InvalidResponse(format!("{} {path}: {e}", verb.as_str())))
    }

    /// Fetch every page of a list endpoint.
    ///
    /// `field` names the array inside wrapped responses
    /// (`{"total_count": n, "variables": [...]}`); `None` means the page
    /// itself is the array.
    fn get_pages<T: DeserializeOwned>(&self, path: &str, field: Option<&str>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1.. {
            let body: Value = self.get_json(&page_path(path, page))?;
            let batch = match field {
                Some(field) => body.get(field).cloned().ok_or_else(|| {
                    Error::InvalidResponse(format!("GET {path}: missing '{field}'"))
                })?,
                None => body,
            };
            let batch: Vec<T> = serde_json::from_value(batch)?;
            let last = batch.len() < PER_PAGE;
            items.extend(batch);
            if last {
                break;
            }
        }
        Ok(items)
    }
}

fn page_path(path: &str, page: usize) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}per_page={PER_PAGE}&page={page}")
}

impl OrgApi for GitHubOrg {
    fn org(&self) -> &str {
        &self.org
    }

    fn list_variables(&self) -> Result<Vec<Variable>> {
        self.get_pages(&self.org_path("/actions/variables"), Some("variables"))
    }

    fn get_variable(&self, name: &str) -> Result<Variable> {
        self.get_json(&self.org_path(&format!("/actions/variables/{name}")))
    }

    fn create_variable(&self, name: &str, value: &str) -> Result<()> {
        let body = json!({"name": name, "value": value, "visibility": "all"});
        self.write(Verb::Post, &self.org_path("/actions/variables"), &body)?;
        Ok(())
    }

    fn update_variable(&self, name: &str, value: &str) -> Result<()> {
        let body = json!({"name": name, "value": value, "visibility": "all"});
        let path = self.org_path(&format!("/actions/variables/{name}"));
        self.write(Verb::Patch, &path, &body)?;
        Ok(())
    }

    fn delete_variable(&self, name: &str) -> Result<()> {
        self.delete(&self.org_path(&format!("/actions/variables/{name}")))
    }

    fn list_secret_names(&self) -> Result<Vec<String>> {
        let secrets: Vec<NamedEntry> =
            self.get_pages(&self.org_path("/actions/secrets"), Some("secrets"))?;
        Ok(secrets.into_iter().map(|s| s.name).collect())
    }

    fn secrets_public_key(&self) -> Result<PublicKey> {
        self.get_json(&self.org_path("/actions/secrets/public-key"))
    }

    fn put_secret(&self, name: &str, encrypted_value: &str, key_id: &str) -> Result<()> {
        let body = json!({
            "encrypted_value": encrypted_value,
            "key_id": key_id,
            "visibility": "all",
        });
        let path = self.org_path(&format!("/actions/secrets/{name}"));
        self.write(Verb::Put, &path, &body)?;
        Ok(())
    }

    fn get_settings(&self) -> Result<Map<String, Value>> {
        self.get_json(&self.org_path(""))
    }

    fn update_settings(&self, patch: &Map<String, Value>) -> Result<()> {
        self.write(Verb::Patch, &self.org_path(""), patch)?;
        Ok(())
    }

    fn list_rulesets(&self) -> Result<Vec<RulesetSummary>> {
        self.get_pages(&self.org_path("/rulesets"), None)
    }

    fn get_ruleset(&self, id: u64) -> Result<Value> {
        self.get_json(&self.org_path(&format!("/rulesets/{id}")))
    }

    fn create_ruleset(&self, body: &Value) -> Result<u64> {
        let created: RulesetSummary =
            self.write_json(Verb::Post, &self.org_path("/rulesets"), body)?;
        Ok(created.id)
    }

    fn update_ruleset(&self, id: u64, body: &Value) -> Result<()> {
        self.write(Verb::Put, &self.org_path(&format!("/rulesets/{id}")), body)?;
        Ok(())
    }

    fn delete_ruleset(&self, id: u64) -> Result<()> {
        self.delete(&self.org_path(&format!("/rulesets/{id}")))
    }

    fn list_teams(&self) -> Result<Vec<Team>> {
        self.get_pages(&self.org_path("/teams"), None)
    }

    fn create_team(&self, team: &TeamRequest) -> Result<Team> {
        self.write_json(Verb::Post, &self.org_path("/teams"), team)
    }

    fn update_team(&self, slug: &str, team: &TeamRequest) -> Result<Team> {
        self.write_json(Verb::Patch, &self.org_path(&format!("/teams/{slug}")), team)
    }

    fn list_team_members(&self, slug: &str, role: TeamRole) -> Result<Vec<String>> {
        let path = self.org_path(&format!("/teams/{slug}/members?role={role}"));
        let members: Vec<Member> = self.get_pages(&path, None)?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    fn set_team_membership(&self, slug: &str, login: &str, role: TeamRole) -> Result<()> {
        let path = self.org_path(&format!("/teams/{slug}/memberships/{login}"));
        self.write(Verb::Put, &path, &json!({"role": role}))?;
        Ok(())
    }

    fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.get_pages(&self.org_path("/repos?type=all"), None)
    }

    fn list_labels(&self, repo: &str) -> Result<Vec<Label>> {
        self.get_pages(&self.label_path(repo, None), None)
    }

    fn create_label(&self, repo: &str, label: &Label) -> Result<()> {
        self.write(Verb::Post, &self.label_path(repo, None), label)?;
        Ok(())
    }

    fn update_label(&self, repo: &str, name: &str, label: &Label) -> Result<()> {
        let body = LabelUpdate {
            new_name: &label.name,
            color: &label.color,
            description: label.description.as_deref(),
        };
        self.write(Verb::Patch, &self.label_path(repo, Some(name)), &body)?;
        Ok(())
    }
}

// =============================================================================
// GitHub API request/response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Member {
    login: String,
}

#[derive(Debug, Serialize)]
struct LabelUpdate<'a> {
    new_name: &'a str,
    color: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_paths() {
        let org = GitHubOrg::new("acme", "t");
        assert_eq!(org.org_path(""), "/orgs/acme");
        assert_eq!(
            org.url(&org.org_path("/actions/variables")),
            "https://api.github.com/orgs/acme/actions/variables"
        );
    }

    #[test]
    fn test_custom_api_base_trims_slash() {
        let org = GitHubOrg::with_api_base("acme", "t", "https://ghe.example.com/api/v3/");
        assert_eq!(org.api_base(), "https://ghe.example.com/api/v3");
        assert_eq!(
            org.url("/orgs/acme/teams"),
            "https://ghe.example.com/api/v3/orgs/acme/teams"
        );
    }

    #[test]
    fn test_page_path() {
        assert_eq!(
            page_path("/orgs/acme/teams", 2),
            "/orgs/acme/teams?per_page=100&page=2"
        );
        assert_eq!(
            page_path("/orgs/acme/teams/core/members?role=member", 1),
            "/orgs/acme/teams/core/members?role=member&per_page=100&page=1"
        );
    }

    #[test]
    fn test_label_path_encodes_name() {
        let org = GitHubOrg::new("acme", "t");
        assert_eq!(org.label_path("algo-1", None), "/repos/acme/algo-1/labels");
        assert_eq!(
            org.label_path("algo-1", Some("good first issue")),
            "/repos/acme/algo-1/labels/good%20first%20issue"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let org = GitHubOrg::new("acme", "ghp_secret");
        let debug = format!("{org:?}");
        assert!(debug.contains("acme"));
        assert!(!debug.contains("ghp_secret"));
    }

    #[test]
    fn test_label_update_body() {
        let body = LabelUpdate {
            new_name: "bug",
            color: "d73a4a",
            description: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"new_name": "bug", "color": "d73a4a"})
        );
    }

    #[test]
    fn test_wrapped_list_shape() {
        let page = json!({
            "total_count": 1,
            "secrets": [{"name": "DEPLOY_KEY", "created_at": "2024-01-01T00:00:00Z"}]
        });
        let entries: Vec<NamedEntry> = serde_json::from_value(page["secrets"].clone()).unwrap();
        assert_eq!(entries[0].name, "DEPLOY_KEY");
    }
}
