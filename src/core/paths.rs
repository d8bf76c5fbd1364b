//! core::paths
//!
//! Centralized path routing for enlistment storage locations.
//!
//! # Architecture
//!
//! Every file the mount manager reads or writes inside an enlistment is
//! computed here. No other module joins `.vmount` or `.git` paths by hand.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//!   .vmount/
//!     repo-metadata.json   - disk layout version and identity
//!     config.toml          - enlistment configuration
//!     mount.lock           - OS-level exclusive lock while mounted
//!     mount.held           - held alongside mount.lock; probed by observers
//!     mount-session.json   - advisory description of the live session
//!     unmount-request      - written by `vmount unmount`
//!   src/                   - repository root, projected to applications
//!     .git/
//!       hooks/             - runtime artifacts (read-object, ...)
//!       index.lock         - stale lock artifact candidate
//! ```
//!
//! # Example
//!
//! ```
//! use vmount::core::paths::EnlistmentPaths;
//! use std::path::PathBuf;
//!
//! let paths = EnlistmentPaths::new(PathBuf::from("/work/repo"));
//!
//! assert_eq!(
//!     paths.metadata_path(),
//!     PathBuf::from("/work/repo/.vmount/repo-metadata.json")
//! );
//! assert_eq!(
//!     paths.index_lock_path(),
//!     PathBuf::from("/work/repo/src/.git/index.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Name of the mount manager's private directory under the enlistment root.
pub const DOT_DIR_NAME: &str = ".vmount";

/// Name of the repository root directory under the enlistment root.
pub const REPO_ROOT_NAME: &str = "src";

/// Centralized path routing for one enlistment.
///
/// # Invariants
///
/// - `root` is the enlistment root, never a nested directory
/// - All repository-relative paths go through [`EnlistmentPaths::repo_root`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnlistmentPaths {
    /// Enlistment root directory.
    pub root: PathBuf,
}

impl EnlistmentPaths {
    /// Create paths for an enlistment rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The enlistment root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // =========================================================================
    // Mount manager storage
    // =========================================================================

    /// `<root>/.vmount`
    pub fn dot_dir(&self) -> PathBuf {
        self.root.join(DOT_DIR_NAME)
    }

    /// `<root>/.vmount/repo-metadata.json`
    pub fn metadata_path(&self) -> PathBuf {
        self.dot_dir().join("repo-metadata.json")
    }

    /// `<root>/.vmount/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.dot_dir().join("config.toml")
    }

    /// `<root>/.vmount/mount.lock`
    pub fn mount_lock_path(&self) -> PathBuf {
        self.dot_dir().join("mount.lock")
    }

    /// `<root>/.vmount/mount.held`
    pub fn mount_held_path(&self) -> PathBuf {
        self.dot_dir().join("mount.held")
    }

    /// `<root>/.vmount/mount-session.json`
    pub fn session_marker_path(&self) -> PathBuf {
        self.dot_dir().join("mount-session.json")
    }

    /// `<root>/.vmount/unmount-request`
    pub fn unmount_request_path(&self) -> PathBuf {
        self.dot_dir().join("unmount-request")
    }

    // =========================================================================
    // Repository paths
    // =========================================================================

    /// `<root>/src`, the directory projected to applications.
    pub fn repo_root(&self) -> PathBuf {
        self.root.join(REPO_ROOT_NAME)
    }

    /// `<root>/src/.git`
    pub fn git_dir(&self) -> PathBuf {
        self.repo_root().join(".git")
    }

    /// `<root>/src/.git/hooks`
    pub fn hooks_dir(&self) -> PathBuf {
        self.git_dir().join("hooks")
    }

    /// `<root>/src/.git/index.lock`
    pub fn index_lock_path(&self) -> PathBuf {
        self.git_dir().join("index.lock")
    }

    /// Resolve a path inside the virtual namespace.
    ///
    /// An empty relative path resolves to the repository root itself.
    pub fn virtual_path_to(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.as_os_str().is_empty() {
            self.repo_root()
        } else {
            self.repo_root().join(relative)
        }
    }

    /// `core.hooksPath` value for this enlistment.
    ///
    /// Always uses forward slashes so the value is identical however the
    /// host spells its separators.
    pub fn hooks_path_setting(&self) -> String {
        self.hooks_dir().to_string_lossy().replace('\\', "/")
    }

    /// Check whether `dir` looks like an enlistment root.
    pub fn is_enlistment_root(dir: &Path) -> bool {
        dir.join(DOT_DIR_NAME).is_dir()
    }
}
