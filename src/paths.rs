//! Centralized path resolution for orgsync
//!
//! Declarations live in the config directory so they can be kept in a
//! separate repository and symlinked in; snapshots live in the state
//! directory.
//!
//! # Environment Variables
//!
//! - `ORGSYNC_CONFIG_DIR` - Override config directory (e.g., `~/infra/github`)
//! - `ORGSYNC_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `--config-dir` flag
//! 2. `ORGSYNC_CONFIG_DIR` environment variable
//! 3. `XDG_CONFIG_HOME/orgsync` (if set)
//! 4. `~/.config/orgsync`
//!
//! For state_dir():
//! 1. `ORGSYNC_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/orgsync` (if set)
//! 3. `~/.local/state/orgsync`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "ORGSYNC_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "ORGSYNC_STATE_DIR";

const APP_DIR: &str = "orgsync";

/// Get the config directory, honoring an explicit override first
pub fn config_dir(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        let path = expand(&dir.to_string_lossy());
        log::debug!("Using config dir from --config-dir: {}", path.display());
        return Ok(path);
    }

    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the orgsync state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Directory holding persisted snapshots
pub fn snapshots_dir() -> Result<PathBuf> {
    Ok(state_dir()?.join("snapshots"))
}

/// Expand ~ and environment variables in a path string.
///
/// # Examples
///
/// ```ignore
/// let home_path = paths::expand("~/infra/github");
/// let var_path = paths::expand("$HOME/infra/github");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `key` set (or removed when `value` is `None`), restoring it afterwards
    pub(crate) fn with_env<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: callers hold ENV_LOCK, so no other test reads the environment concurrently
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_flag_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_CONFIG_DIR, Some("/from/env"), || {
            let result = config_dir(Some(Path::new("/from/flag"))).unwrap();
            assert_eq!(result, PathBuf::from("/from/flag"));
        });
    }

    #[test]
    fn test_config_dir_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_CONFIG_DIR, Some("/custom/config/path"), || {
            let result = config_dir(None).unwrap();
            assert_eq!(result, PathBuf::from("/custom/config/path"));
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let _guard = ENV_LOCK.lock().unwrap();
        let home = dirs::home_dir().unwrap();
        with_env(ENV_CONFIG_DIR, Some("~/infra/orgsync-tilde-test"), || {
            let result = config_dir(None).unwrap();
            assert_eq!(result, home.join("infra").join("orgsync-tilde-test"));
        });
    }

    #[test]
    fn test_xdg_config_home() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_CONFIG_DIR, None, || {
            with_env("XDG_CONFIG_HOME", Some("/tmp/xdg-config-test"), || {
                let result = config_dir(None).unwrap();
                assert_eq!(result, PathBuf::from("/tmp/xdg-config-test/orgsync"));
            });
        });
    }

    #[test]
    fn test_state_dir_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_STATE_DIR, Some("/custom/state/path"), || {
            assert_eq!(state_dir().unwrap(), PathBuf::from("/custom/state/path"));
            assert_eq!(
                snapshots_dir().unwrap(),
                PathBuf::from("/custom/state/path/snapshots")
            );
        });
    }

    #[test]
    fn test_xdg_state_home() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_STATE_DIR, None, || {
            with_env("XDG_STATE_HOME", Some("/tmp/xdg-state-test"), || {
                let result = state_dir().unwrap();
                assert_eq!(result, PathBuf::from("/tmp/xdg-state-test/orgsync"));
            });
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_default_state_dir_unix() {
        let _guard = ENV_LOCK.lock().unwrap();
        with_env(ENV_STATE_DIR, None, || {
            with_env("XDG_STATE_HOME", None, || {
                let result = state_dir().unwrap();
                let home = dirs::home_dir().unwrap();
                assert_eq!(result, home.join(".local").join("state").join("orgsync"));
            });
        });
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
