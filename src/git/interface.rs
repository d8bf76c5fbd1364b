//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to git for vmount. The mount engine
//! only needs a narrow slice of git: opening the enlistment's repository,
//! creating one for a new enlistment, and reading or writing local config
//! keys such as `core.hooksPath`.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at the expected location
//! - [`GitError::BareRepo`]: Repository has no working directory
//! - [`GitError::Config`]: Reading or writing config failed
//! - [`GitError::Internal`]: Anything else libgit2 reports
//!
//! # Example
//!
//! ```ignore
//! use vmount::git::Git;
//!
//! let git = Git::open(&paths.repo_root())?;
//! git.set_hooks_path(&paths.hooks_path_setting())?;
//! assert_eq!(git.hooks_path()?.as_deref(), Some("/work/repo/src/.git/hooks"));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Config key pointing git at the hook directory.
pub const HOOKS_PATH_KEY: &str = "core.hooksPath";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a Git repository.
    #[error("not a git repository: {}", path.display())]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Reading or writing a config key failed.
    #[error("git config {key}: {message}")]
    Config {
        /// The key being accessed
        key: String,
        /// Error from libgit2
        message: String,
    },

    /// Other libgit2 failure.
    #[error("git error: {message}")]
    Internal {
        /// Error from libgit2
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        GitError::Internal {
            message: e.message().to_string(),
        }
    }
}

/// Handle to one repository.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("git_dir", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open the repository whose working directory is exactly `path`.
    ///
    /// Unlike discovery, this never walks up to a parent repository: an
    /// enlistment's repository lives at a fixed location.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Create a new non-bare repository at `path`.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(path)?;
        Ok(Self { repo })
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // Config
    // =========================================================================

    /// Read a string from the repository's local config.
    ///
    /// Returns `Ok(None)` when the key is not set.
    pub fn local_config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let config_err = |e: git2::Error| GitError::Config {
            key: key.to_string(),
            message: e.message().to_string(),
        };

        let snapshot = self
            .local_config()?
            .snapshot()
            .map_err(config_err)?;

        match snapshot.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(config_err(e)),
        }
    }

    /// Write a string to the repository's local config.
    pub fn local_config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.local_config()?
            .set_str(key, value)
            .map_err(|e| GitError::Config {
                key: key.to_string(),
                message: e.message().to_string(),
            })
    }

    /// Remove a key from the repository's local config.
    ///
    /// Removing a key that is not set is not an error.
    pub fn local_config_unset(&self, key: &str) -> Result<(), GitError> {
        match self.local_config()?.remove(key) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(e) => Err(GitError::Config {
                key: key.to_string(),
                message: e.message().to_string(),
            }),
        }
    }

    /// Current `core.hooksPath`, if set.
    pub fn hooks_path(&self) -> Result<Option<String>, GitError> {
        self.local_config_get(HOOKS_PATH_KEY)
    }

    /// Point `core.hooksPath` at `value`.
    pub fn set_hooks_path(&self, value: &str) -> Result<(), GitError> {
        self.local_config_set(HOOKS_PATH_KEY, value)
    }

    fn local_config(&self) -> Result<git2::Config, GitError> {
        let config = self.repo.config()?;
        config
            .open_level(git2::ConfigLevel::Local)
            .map_err(GitError::from)
    }
}
