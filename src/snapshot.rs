//! Snapshots of live organization state
//!
//! A snapshot is captured before an apply run mutates anything, so any
//! run can be undone with `orgsync restore`. Snapshots are JSON files in
//! the state directory, named after their capture time, and are never
//! overwritten.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use declarative::StateMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::paths;

const EXTENSION: &str = "json";

/// Errors reading a persisted snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot '{locator}' not found")]
    NotFound { locator: String },

    #[error("snapshot '{locator}' is corrupt: {message}")]
    Corrupt { locator: String, message: String },

    #[error("'{locator}' is not a snapshot locator")]
    InvalidLocator { locator: String },
}

/// Immutable capture of live state across categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    /// Category name → state; secrets carry names only
    pub resource_states: BTreeMap<String, StateMap>,
}

impl Snapshot {
    /// Stamp the given states with the current time
    pub fn capture(resource_states: BTreeMap<String, StateMap>) -> Self {
        Self {
            timestamp: Utc::now(),
            resource_states,
        }
    }

    /// Locator derived from the capture time, e.g. `2026-10-18T09-30-00-123Z`
    pub fn base_locator(&self) -> String {
        self.timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-")
    }

    /// Number of entries across all categories
    pub fn entry_count(&self) -> usize {
        self.resource_states.values().map(BTreeMap::len).sum()
    }
}

/// Orders a locator by capture time, then by collision suffix
fn sort_key(locator: &str) -> (&str, u32) {
    match locator.rsplit_once('-') {
        Some((base, suffix)) if base.ends_with('Z') => match suffix.parse::<u32>() {
            Ok(n) => (base, n),
            Err(_) => (locator, 0),
        },
        _ => (locator, 0),
    }
}

/// Directory of persisted snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the default state directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::snapshots_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, locator: &str) -> PathBuf {
        self.dir.join(format!("{locator}.{EXTENSION}"))
    }

    /// Locators are bare file stems inside the store
    fn check_locator(locator: &str) -> Result<(), SnapshotError> {
        if locator.is_empty() || locator.starts_with('.') || locator.contains(['/', '\\']) {
            return Err(SnapshotError::InvalidLocator {
                locator: locator.to_string(),
            });
        }
        Ok(())
    }

    /// Write a snapshot, returning its locator
    ///
    /// An existing file is never replaced: a colliding locator gets a
    /// numeric suffix instead.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<String> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!(
                "Failed to create snapshot directory: {}",
                self.dir.display()
            )
        })?;

        let content =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        let base = snapshot.base_locator();

        let mut attempt = 0u32;
        loop {
            let locator = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let path = self.path_for(&locator);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create {}", path.display()));
                }
            };

            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;

            log::info!("Saved snapshot {}", path.display());
            return Ok(locator);
        }
    }

    /// All locators, most recent first
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;

        let mut locators = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                locators.push(stem.to_string());
            }
        }

        locators.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
        Ok(locators)
    }

    /// Newest locator, if any snapshot exists
    pub fn latest(&self) -> Result<Option<String>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Read a snapshot by locator
    pub fn read(&self, locator: &str) -> Result<Snapshot> {
        Self::check_locator(locator)?;
        let path = self.path_for(locator);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound {
                    locator: locator.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            SnapshotError::Corrupt {
                locator: locator.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut variables = StateMap::new();
        variables.insert("REGION".to_string(), json!("eu"));
        let mut secrets = StateMap::new();
        secrets.insert("DEPLOY_KEY".to_string(), serde_json::Value::Null);

        let mut states = BTreeMap::new();
        states.insert("variables".to_string(), variables);
        states.insert("secrets".to_string(), secrets);

        Snapshot {
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
            resource_states: states,
        }
    }

    #[test]
    fn test_locator_from_timestamp() {
        assert_eq!(sample().base_locator(), "2026-10-18T09-30-00-000Z");
    }

    #[test]
    fn test_capture_stores_states_verbatim() {
        let states = sample().resource_states;
        let snapshot = Snapshot::capture(states.clone());
        assert_eq!(snapshot.resource_states, states);
        assert_eq!(snapshot.entry_count(), 2);
    }

    #[test]
    fn test_persist_and_read() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let snapshot = sample();
        let locator = store.persist(&snapshot).unwrap();

        assert_eq!(store.read(&locator).unwrap(), snapshot);
    }

    #[test]
    fn test_persist_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let first = sample();
        let mut second = sample();
        second
            .resource_states
            .get_mut("variables")
            .unwrap()
            .insert("REGION".to_string(), json!("us"));

        let a = store.persist(&first).unwrap();
        let b = store.persist(&second).unwrap();

        assert_ne!(a, b);
        assert_eq!(b, format!("{a}-1"));
        assert_eq!(store.read(&a).unwrap(), first);
        assert_eq!(store.read(&b).unwrap(), second);
    }

    #[test]
    fn test_list_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let older = sample();
        let mut newer = sample();
        newer.timestamp = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();

        store.persist(&older).unwrap();
        store.persist(&newer).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(
            listed,
            vec!["2026-10-19T08-00-00-000Z", "2026-10-18T09-30-00-000Z"]
        );
        assert_eq!(
            store.latest().unwrap().as_deref(),
            Some("2026-10-19T08-00-00-000Z")
        );
    }

    #[test]
    fn test_collision_suffixes_sort_numerically() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        for _ in 0..11 {
            store.persist(&sample()).unwrap();
        }

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 11);
        assert_eq!(listed[0], "2026-10-18T09-30-00-000Z-10");
        assert_eq!(listed[1], "2026-10-18T09-30-00-000Z-9");
        assert_eq!(listed[10], "2026-10-18T09-30-00-000Z");
        assert_eq!(
            store.latest().unwrap().as_deref(),
            Some("2026-10-18T09-30-00-000Z-10")
        );
    }

    #[test]
    fn test_read_rejects_paths_outside_store() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));
        fs::write(
            dir.path().join("outside.json"),
            serde_json::to_string(&sample()).unwrap(),
        )
        .unwrap();

        for locator in ["../outside", "..", "a/b", r"a\b", ""] {
            let err = store.read(locator).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<SnapshotError>(),
                    Some(SnapshotError::InvalidLocator { .. })
                ),
                "{locator} was accepted"
            );
        }
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("never-created"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn test_read_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let err = store.read("2020-01-01T00-00-00-000Z").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::NotFound { .. })
        ));
    }

    #[test]
    fn test_read_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(dir.path().join("broken.json"), r#"{"timestamp": 42}"#).unwrap();

        let err = store.read("broken").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::Corrupt { .. })
        ));
    }
}
