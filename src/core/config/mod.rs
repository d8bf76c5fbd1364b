//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! vmount has two configuration scopes:
//! - **Global**: User-level settings
//! - **Enlistment**: Per-enlistment overrides
//!
//! # Precedence
//!
//! 1. Default values
//! 2. Global config file
//! 3. Enlistment config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$VMOUNT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/vmount/config.toml`
//! 3. `~/.vmount/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use vmount::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/work/repo"))).unwrap();
//! println!("hooks: {:?}", config.hook_names());
//! println!("legacy exit codes: {}", config.legacy_exit_codes());
//! ```

pub mod schema;

pub use schema::{EnlistmentConfig, GlobalConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::paths::EnlistmentPaths;

/// Hook executables installed into every enlistment unless overridden.
pub const DEFAULT_HOOKS: &[&str] = &["read-object", "virtual-filesystem"];

const DEFAULT_MAINTENANCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UNMOUNT_POLL_MS: u64 = 250;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Enlistment configuration (if one was found)
    pub enlistment: Option<EnlistmentConfig>,
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `enlistment_root` is provided, also loads that enlistment's config.
    /// Missing files are not an error.
    pub fn load(enlistment_root: Option<&Path>) -> Result<Self, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), enlistment_root)
    }

    /// Load configuration from an explicit global file.
    pub fn load_from(
        global_path: Option<&Path>,
        enlistment_root: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let global = match global_path {
            Some(path) if path.exists() => read_toml::<GlobalConfig>(path)?,
            _ => GlobalConfig::default(),
        };
        global.validate()?;

        let enlistment = match enlistment_root {
            Some(root) => {
                let path = EnlistmentPaths::new(root.to_path_buf()).config_path();
                if path.exists() {
                    let config = read_toml::<EnlistmentConfig>(&path)?;
                    config.validate()?;
                    Some(config)
                } else {
                    None
                }
            }
            None => None,
        };

        Ok(Config {
            global,
            enlistment,
            global_path: global_path.filter(|p| p.exists()).map(Path::to_path_buf),
        })
    }

    /// Locate the global config file, if any.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VMOUNT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("vmount/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".vmount/config.toml"))
            .filter(|path| path.exists())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Directory holding bundled hook executables.
    ///
    /// Defaults to the directory containing the running executable.
    pub fn hooks_source_dir(&self) -> Option<PathBuf> {
        self.global.hooks_source_dir.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        })
    }

    /// Hook executables to install.
    pub fn hook_names(&self) -> Vec<String> {
        self.enlistment
            .as_ref()
            .and_then(|e| e.hooks.clone())
            .unwrap_or_else(|| DEFAULT_HOOKS.iter().map(|s| s.to_string()).collect())
    }

    /// Extra lock files (relative to `.git`) cleared after mount.
    pub fn extra_lock_files(&self) -> Vec<String> {
        self.enlistment
            .as_ref()
            .and_then(|e| e.extra_lock_files.clone())
            .unwrap_or_default()
    }

    /// Whether legacy exit codes are in effect. Defaults to `false`.
    pub fn legacy_exit_codes(&self) -> bool {
        self.global.legacy_exit_codes.unwrap_or(false)
    }

    /// Bound on waiting for background maintenance.
    pub fn maintenance_timeout(&self) -> Duration {
        Duration::from_secs(
            self.global
                .maintenance_timeout_secs
                .unwrap_or(DEFAULT_MAINTENANCE_TIMEOUT_SECS),
        )
    }

    /// Interval between unmount-request checks.
    pub fn unmount_poll_interval(&self) -> Duration {
        Duration::from_millis(self.global.unmount_poll_ms.unwrap_or(DEFAULT_UNMOUNT_POLL_MS))
    }

    /// Path of the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_without_files_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(Some(&temp.path().join("missing.toml")), None).unwrap();

        assert_eq!(config.hook_names(), vec!["read-object", "virtual-filesystem"]);
        assert!(config.extra_lock_files().is_empty());
        assert!(!config.legacy_exit_codes());
        assert_eq!(config.maintenance_timeout(), Duration::from_secs(30));
        assert_eq!(config.unmount_poll_interval(), Duration::from_millis(250));
        assert!(config.global_config_loaded_from().is_none());
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
            hooks_source_dir = "/opt/hooks"
            legacy_exit_codes = true
            maintenance_timeout_secs = 5
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path), None).unwrap();
        assert!(config.legacy_exit_codes());
        assert_eq!(config.hooks_source_dir(), Some(PathBuf::from("/opt/hooks")));
        assert_eq!(config.maintenance_timeout(), Duration::from_secs(5));
        assert_eq!(config.global_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn load_enlistment_file() {
        let temp = TempDir::new().unwrap();
        let paths = EnlistmentPaths::new(temp.path().to_path_buf());
        fs::create_dir_all(paths.dot_dir()).unwrap();
        fs::write(
            paths.config_path(),
            r#"
            hooks = ["read-object"]
            extra_lock_files = ["HEAD.lock"]
            "#,
        )
        .unwrap();

        let config = Config::load_from(None, Some(temp.path())).unwrap();
        assert_eq!(config.hook_names(), vec!["read-object"]);
        assert_eq!(config.extra_lock_files(), vec!["HEAD.lock"]);
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "unknown_field = true").unwrap();

        let err = Config::load_from(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_value_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "unmount_poll_ms = 0").unwrap();

        let err = Config::load_from(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
