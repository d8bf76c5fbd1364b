//! engine::reconcile
//!
//! Stale lock cleanup.
//!
//! A lock file left in `.git` by a crashed git process blocks every later
//! git command in the enlistment. Such a file found at mount time belongs
//! to no live process, so the reconciler removes it. Content is never
//! inspected: an empty file, a marker string, and arbitrary bytes are all
//! removed the same way.
//!
//! The reconciler runs on the maintenance queue after a mount reaches
//! `Active`. Files that cannot be removed are reported and retried by the
//! next mount.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::core::paths::EnlistmentPaths;

/// Lock files removed on every mount, relative to `.git`.
pub const WELL_KNOWN_LOCK_FILES: &[&str] = &["index.lock"];

/// Outcome of one reconcile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Lock files that were present and removed.
    pub removed: Vec<PathBuf>,
    /// Lock files that could not be removed, with the error text.
    pub failed: Vec<(PathBuf, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes stale lock artifacts from one enlistment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleLockReconciler {
    lock_paths: Vec<PathBuf>,
}

impl StaleLockReconciler {
    /// Reconciler for the well-known lock files plus `extra` (relative to
    /// `.git`).
    pub fn for_enlistment(paths: &EnlistmentPaths, extra: &[String]) -> Self {
        let git_dir = paths.git_dir();
        let mut lock_paths: Vec<PathBuf> = WELL_KNOWN_LOCK_FILES
            .iter()
            .map(|name| git_dir.join(name))
            .collect();
        for name in extra {
            let path = git_dir.join(name);
            if !lock_paths.contains(&path) {
                lock_paths.push(path);
            }
        }
        Self { lock_paths }
    }

    pub fn lock_paths(&self) -> &[PathBuf] {
        &self.lock_paths
    }

    /// Remove every lock file that exists.
    pub fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for path in &self.lock_paths {
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed stale lock");
                    report.removed.push(path.clone());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot remove stale lock");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
