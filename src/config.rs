//! Settings and declaration loading
//!
//! Everything lives in the config directory:
//!
//! ```text
//! ~/.config/orgsync/
//! ├── orgsync.toml      # org, api_base, token_env
//! ├── variables.toml    # name → value
//! ├── secrets.toml      # name → plaintext or "env:NAME"
//! ├── privileges.toml   # settings flag → value
//! ├── rulesets.json     # name → ruleset descriptor
//! ├── teams.toml        # name → team descriptor
//! └── labels.toml       # repository patterns + labels
//! ```
//!
//! Each file may be JSON or TOML; when both exist the JSON file wins.
//! A missing file means the category is not managed at all.

use anyhow::{Context, Result, bail};
use declarative::StateMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::labels::LabelsDecl;
use crate::resource::teams::TeamDecl;

/// Base name of the settings file
pub const SETTINGS_STEM: &str = "orgsync";

/// Prefix marking a secret value that should be read from the environment
pub const ENV_PREFIX: &str = "env:";

/// A declaration file exists but cannot be parsed into its expected shape
#[derive(Debug, thiserror::Error)]
#[error("failed to parse {}: {message}", path.display())]
pub struct DeclarationParseError {
    pub path: PathBuf,
    pub message: String,
}

/// Supported declaration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> std::result::Result<T, String> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Find `<stem>.json` or `<stem>.toml` in `dir`, JSON first
pub fn find_config_file(dir: &Path, stem: &str) -> Option<(PathBuf, ConfigFormat)> {
    [ConfigFormat::Json, ConfigFormat::Toml]
        .into_iter()
        .map(|format| (dir.join(format!("{stem}.{}", format.extension())), format))
        .find(|(path, _)| path.is_file())
}

/// Load and parse `<stem>.{json,toml}` if present
fn load_file<T: DeserializeOwned>(dir: &Path, stem: &str) -> Result<Option<T>> {
    let Some((path, format)) = find_config_file(dir, stem) else {
        log::debug!("No {stem} declaration in {}", dir.display());
        return Ok(None);
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let parsed = format
        .parse(&content)
        .map_err(|message| DeclarationParseError {
            path: path.clone(),
            message,
        })?;

    log::debug!("Loaded {}", path.display());
    Ok(Some(parsed))
}

// ============================================================================
// Settings
// ============================================================================

/// Connection settings from `orgsync.{toml,json}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Organization login
    pub org: Option<String>,
    /// REST API base URL
    pub api_base: String,
    /// Environment variable holding the API token
    pub token_env: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            org: None,
            api_base: ghclient::DEFAULT_API_BASE.to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when no settings file exists
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(load_file(dir, SETTINGS_STEM)?.unwrap_or_default())
    }

    /// Organization to administer; the flag wins over the settings file
    pub fn org(&self, flag: Option<&str>) -> Result<String> {
        match flag.or(self.org.as_deref()) {
            Some(org) if !org.trim().is_empty() => Ok(org.trim().to_string()),
            _ => bail!(
                "No organization configured: pass --org or set `org` in {SETTINGS_STEM}.toml"
            ),
        }
    }

    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => bail!(
                "No API token found: set {} to a token with organization admin scope",
                self.token_env
            ),
        }
    }
}

// ============================================================================
// Secret Source
// ============================================================================

/// Secret plaintexts: name → value, or `env:NAME` to read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretSource {
    entries: BTreeMap<String, String>,
}

impl SecretSource {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Declared secret names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Plaintext for `name`, if one is available
    ///
    /// Empty values and unset `env:` indirections count as unavailable.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let raw = self.entries.get(name)?;
        let value = match raw.strip_prefix(ENV_PREFIX) {
            Some(var) => std::env::var(var.trim()).ok()?,
            None => raw.clone(),
        };
        (!value.is_empty()).then_some(value)
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Declared desired state, one optional entry per category
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub variables: Option<StateMap>,
    pub secrets: Option<SecretSource>,
    pub privileges: Option<StateMap>,
    pub rulesets: Option<StateMap>,
    pub teams: Option<BTreeMap<String, TeamDecl>>,
    pub labels: Option<LabelsDecl>,
}

impl Declarations {
    /// Load every declaration file present in `dir`
    ///
    /// Fails with [`DeclarationParseError`] on the first file that does
    /// not parse, before anything touches the remote side.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            log::warn!("Config directory {} does not exist", dir.display());
            return Ok(Self::default());
        }

        Ok(Self {
            variables: load_file(dir, "variables")?,
            secrets: load_file(dir, "secrets")?,
            privileges: load_file(dir, "privileges")?,
            rulesets: load_file(dir, "rulesets")?,
            teams: load_file(dir, "teams")?,
            labels: load_file(dir, "labels")?,
        })
    }

    /// Check if no category is declared
    pub fn is_empty(&self) -> bool {
        self.variables.is_none()
            && self.secrets.is_none()
            && self.privileges.is_none()
            && self.rulesets.is_none()
            && self.teams.is_none()
            && self.labels.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::tests::{ENV_LOCK, with_env};
    use ghclient::TeamRole;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_settings_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_base, "https://api.github.com");
        assert_eq!(settings.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_settings_from_toml() {
        let dir = TempDir::new().unwrap();
        write(&dir, "orgsync.toml", "org = \"acme\"\ntoken_env = \"ACME_TOKEN\"\n");

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.org(None).unwrap(), "acme");
        assert_eq!(settings.org(Some("other")).unwrap(), "other");
        assert_eq!(settings.token_env, "ACME_TOKEN");
        assert_eq!(settings.api_base, ghclient::DEFAULT_API_BASE);
    }

    #[test]
    fn test_missing_org_is_an_error() {
        let err = Settings::default().org(None).unwrap_err();
        assert!(err.to_string().contains("--org"));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        let settings = Settings {
            token_env: "ORGSYNC_TEST_TOKEN_UNSET".to_string(),
            ..Settings::default()
        };
        with_env("ORGSYNC_TEST_TOKEN_UNSET", None, || {
            let err = settings.token().unwrap_err();
            assert!(err.to_string().contains("ORGSYNC_TEST_TOKEN_UNSET"));
        });
        with_env("ORGSYNC_TEST_TOKEN_UNSET", Some("ghp_x"), || {
            assert_eq!(settings.token().unwrap(), "ghp_x");
        });
    }

    #[test]
    fn test_json_wins_over_toml() {
        let dir = TempDir::new().unwrap();
        write(&dir, "variables.json", r#"{"REGION": "eu"}"#);
        write(&dir, "variables.toml", "REGION = \"us\"\n");

        let decls = Declarations::load(dir.path()).unwrap();
        assert_eq!(decls.variables.unwrap()["REGION"], json!("eu"));
    }

    #[test]
    fn test_missing_files_leave_categories_unmanaged() {
        let dir = TempDir::new().unwrap();
        write(&dir, "privileges.toml", "members_can_create_repositories = false\n");

        let decls = Declarations::load(dir.path()).unwrap();
        assert!(decls.variables.is_none());
        assert!(decls.teams.is_none());
        assert!(!decls.is_empty());
        assert_eq!(
            decls.privileges.unwrap()["members_can_create_repositories"],
            json!(false)
        );
    }

    #[test]
    fn test_parse_failure_is_typed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "teams.json", "{ not json");

        let err = Declarations::load(dir.path()).unwrap_err();
        let parse = err.downcast_ref::<DeclarationParseError>().unwrap();
        assert!(parse.path.ends_with("teams.json"));
    }

    #[test]
    fn test_teams_and_labels_from_toml() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "teams.toml",
            r#"
[Core]
description = "Core maintainers"
privacy = "closed"
members = [
    { login = "alice", role = "maintainer" },
    { login = "bob" },
]
"#,
        );
        write(
            &dir,
            "labels.toml",
            r#"
repositories = ["algo-.*"]

[[labels]]
name = "bug"
color = "d73a4a"
"#,
        );

        let decls = Declarations::load(dir.path()).unwrap();
        let teams = decls.teams.unwrap();
        let core = &teams["Core"];
        assert_eq!(core.members.len(), 2);
        assert_eq!(core.members[0].role, TeamRole::Maintainer);
        assert_eq!(core.members[1].role, TeamRole::Member);

        let labels = decls.labels.unwrap();
        assert_eq!(labels.repositories, vec!["algo-.*"]);
        assert_eq!(labels.labels[0].name, "bug");
    }

    #[test]
    fn test_missing_config_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let decls = Declarations::load(&dir.path().join("absent")).unwrap();
        assert!(decls.is_empty());
    }

    #[test]
    fn test_secret_source_resolution() {
        let _guard = ENV_LOCK.lock().unwrap();
        let source = SecretSource::from_entries([
            ("PLAIN", "hunter2"),
            ("FROM_ENV", "env:ORGSYNC_TEST_SECRET"),
            ("EMPTY", ""),
        ]);

        assert_eq!(source.resolve("PLAIN").as_deref(), Some("hunter2"));
        assert_eq!(source.resolve("EMPTY"), None);
        assert_eq!(source.resolve("UNDECLARED"), None);
        with_env("ORGSYNC_TEST_SECRET", Some("s3cret"), || {
            assert_eq!(source.resolve("FROM_ENV").as_deref(), Some("s3cret"));
        });
        with_env("ORGSYNC_TEST_SECRET", None, || {
            assert_eq!(source.resolve("FROM_ENV"), None);
        });
        assert_eq!(
            source.names().collect::<Vec<_>>(),
            vec!["EMPTY", "FROM_ENV", "PLAIN"]
        );
    }
}
