//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$VMOUNT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/vmount/config.toml`
//! 3. `~/.vmount/config.toml` (canonical write location)
//!
//! # Enlistment Config
//!
//! Located at `<root>/.vmount/config.toml`.
//!
//! # Validation
//!
//! Values are validated after parsing: lock file and hook names must be
//! plain relative names that cannot escape the `.git` directory, and
//! timeouts must be non-zero.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// hooks_source_dir = "/opt/vmount/hooks"
/// legacy_exit_codes = false
/// maintenance_timeout_secs = 30
/// unmount_poll_ms = 250
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Directory holding the bundled hook executables
    pub hooks_source_dir: Option<PathBuf>,

    /// Report "already mounted" as exit 0 and every other failure as 3
    pub legacy_exit_codes: Option<bool>,

    /// How long `mount` waits for background maintenance to drain
    pub maintenance_timeout_secs: Option<u64>,

    /// How often a foreground mount checks for an unmount request
    pub unmount_poll_ms: Option<u64>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maintenance_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "maintenance_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.unmount_poll_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "unmount_poll_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.hooks_source_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "hooks_source_dir cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Enlistment configuration.
///
/// # Example
///
/// ```toml
/// hooks = ["read-object", "virtual-filesystem"]
/// extra_lock_files = ["HEAD.lock"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EnlistmentConfig {
    /// Hook executables to install, replacing the built-in list
    pub hooks: Option<Vec<String>>,

    /// Lock files under `.git` cleared after mount, besides `index.lock`
    pub extra_lock_files: Option<Vec<String>>,
}

impl EnlistmentConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for hook in self.hooks.iter().flatten() {
            if !is_plain_file_name(hook) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid hook name '{}': must be a plain file name",
                    hook
                )));
            }
        }
        for lock in self.extra_lock_files.iter().flatten() {
            if !is_contained_relative(lock) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid lock file '{}': must be relative to .git",
                    lock
                )));
            }
        }
        Ok(())
    }
}

/// A single path component with no separators.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// A relative path made only of normal components.
fn is_contained_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
