//! Command implementations
//!
//! Every command that talks to the organization first loads a [`Session`]:
//! settings and declarations are parsed and the credential is read before
//! any remote call, so those failures stop a run with nothing changed.

pub mod apply;
pub mod diff;
pub mod restore;
pub mod snapshot;

use anyhow::Result;
use ghclient::GitHubOrg;
use std::path::PathBuf;

use crate::Context;
use crate::config::{Declarations, Settings};
use crate::paths;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::ui;

/// A run finished with failed changes; the report has already been printed
#[derive(Debug, thiserror::Error)]
#[error("{failed} change(s) failed")]
pub struct RunFailed {
    pub failed: usize,
}

/// Settings and declarations for one invocation
pub struct Session {
    pub config_dir: PathBuf,
    pub settings: Settings,
    pub decls: Declarations,
}

impl Session {
    pub fn load(ctx: &Context) -> Result<Self> {
        let config_dir = paths::config_dir(ctx.config_dir.as_deref())?;
        let settings = Settings::load(&config_dir)?;
        let decls = Declarations::load(&config_dir)?;

        if decls.is_empty() {
            log::warn!("No declarations found in {}", config_dir.display());
        }

        Ok(Self {
            config_dir,
            settings,
            decls,
        })
    }

    /// Client for the configured organization
    pub fn connect(&self, ctx: &Context) -> Result<GitHubOrg> {
        let org = self.settings.org(ctx.org.as_deref())?;
        let token = self.settings.token()?;
        log::info!("Managing organization {org} via {}", self.settings.api_base);
        Ok(GitHubOrg::with_api_base(org, token, &self.settings.api_base))
    }
}

/// Persist a capture of `states` and tell the user where it went
fn save_snapshot(
    store: &SnapshotStore,
    states: std::collections::BTreeMap<String, declarative::StateMap>,
    quiet: bool,
) -> Result<String> {
    let snapshot = Snapshot::capture(states);
    let locator = store.persist(&snapshot)?;
    if !quiet {
        ui::info(&format!(
            "Saved snapshot {} ({} entries)",
            locator,
            snapshot.entry_count()
        ));
    }
    Ok(locator)
}
