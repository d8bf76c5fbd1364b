//! engine::repair
//!
//! Runtime artifact repair.
//!
//! # Architecture
//!
//! A mounted enlistment depends on support files that are not user content:
//! hook executables under `.git/hooks` and the `core.hooksPath` setting that
//! makes git find them. Either can be lost between mounts (an operator
//! deletes a hook, a tool rewrites the config). Repair restores both from
//! the build's own bundled copies without a re-clone.
//!
//! # Invariants
//!
//! - Repair is idempotent: with everything in place a second run changes
//!   no file
//! - A hook is installed through a temp file and rename, never written in
//!   place
//! - `core.hooksPath` is written on every run, independent of hook presence
//!
//! # Example
//!
//! ```ignore
//! use vmount::engine::repair::ArtifactRepair;
//!
//! let repair = ArtifactRepair::new(Some(bundle_dir), &["read-object".to_string()]);
//! let report = repair.ensure(enlistment.paths())?;
//! for (name, action) in &report.artifacts {
//!     println!("{name}: {action}");
//! }
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::paths::EnlistmentPaths;
use crate::git::{Git, GitError};

/// Errors from artifact repair.
#[derive(Debug, Error)]
pub enum RepairError {
    /// An artifact is missing and there is no bundled copy to restore.
    #[error("runtime artifact '{name}' is missing and no bundled copy exists at '{}'", source_path.display())]
    SourceMissing { name: String, source_path: PathBuf },

    /// No directory of bundled artifacts is known.
    #[error("runtime artifact '{name}' is missing and no bundled artifact directory is configured")]
    NoSourceDir { name: String },

    /// Reading or writing an artifact failed.
    #[error("i/o error on '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The path configuration could not be updated.
    #[error("cannot configure hooks path: {0}")]
    Git(#[from] GitError),
}

/// A support file required for a mount to function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeArtifact {
    /// File name, both in the bundle and under `.git/hooks`.
    pub name: String,
    /// Whether the installed copy must be executable.
    pub executable: bool,
}

impl RuntimeArtifact {
    /// An executable hook.
    pub fn hook(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: true,
        }
    }

    /// Install location inside an enlistment.
    pub fn target_path(&self, paths: &EnlistmentPaths) -> PathBuf {
        paths.hooks_dir().join(&self.name)
    }
}

/// What repair did for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactAction {
    /// Present and identical to the bundled copy.
    Unchanged,
    /// Was missing; installed from the bundle.
    Installed,
    /// Present but different from the bundle; replaced.
    Replaced,
    /// Present, but no bundled copy to compare against; left alone.
    KeptWithoutSource,
}

impl fmt::Display for ArtifactAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactAction::Unchanged => "unchanged",
            ArtifactAction::Installed => "installed",
            ArtifactAction::Replaced => "replaced",
            ArtifactAction::KeptWithoutSource => "kept (no bundled copy)",
        };
        f.write_str(s)
    }
}

/// Summary of one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Per-artifact action, in artifact order.
    pub artifacts: Vec<(String, ArtifactAction)>,
    /// `core.hooksPath` value before this pass.
    pub previous_hooks_path: Option<String>,
    /// `core.hooksPath` value written by this pass.
    pub hooks_path: String,
}

impl RepairReport {
    /// Whether any file or setting was changed.
    pub fn changed_anything(&self) -> bool {
        self.previous_hooks_path.as_deref() != Some(self.hooks_path.as_str())
            || self.artifacts.iter().any(|(_, action)| {
                matches!(action, ArtifactAction::Installed | ArtifactAction::Replaced)
            })
    }
}

/// Restores runtime artifacts from the bundled copies.
#[derive(Debug, Clone)]
pub struct ArtifactRepair {
    source_dir: Option<PathBuf>,
    artifacts: Vec<RuntimeArtifact>,
}

impl ArtifactRepair {
    /// Repair the named hooks from `source_dir`.
    pub fn new(source_dir: Option<PathBuf>, hook_names: &[String]) -> Self {
        Self {
            source_dir,
            artifacts: hook_names.iter().map(RuntimeArtifact::hook).collect(),
        }
    }

    /// The artifacts this unit maintains.
    pub fn artifacts(&self) -> &[RuntimeArtifact] {
        &self.artifacts
    }

    /// Bring every artifact and the hooks path setting into place.
    ///
    /// # Errors
    ///
    /// Fails if an artifact is missing with no bundled copy, on I/O errors,
    /// or if git config cannot be written.
    pub fn ensure(&self, paths: &EnlistmentPaths) -> Result<RepairReport, RepairError> {
        let hooks_dir = paths.hooks_dir();
        fs::create_dir_all(&hooks_dir).map_err(|source| RepairError::Io {
            path: hooks_dir.clone(),
            source,
        })?;

        let mut report = RepairReport::default();
        for artifact in &self.artifacts {
            let action = self.ensure_artifact(artifact, paths)?;
            match action {
                ArtifactAction::Unchanged => {
                    debug!(artifact = %artifact.name, "runtime artifact present")
                }
                ArtifactAction::KeptWithoutSource => {
                    warn!(artifact = %artifact.name, "no bundled copy to verify against")
                }
                ArtifactAction::Installed | ArtifactAction::Replaced => {
                    info!(artifact = %artifact.name, %action, "runtime artifact restored")
                }
            }
            report.artifacts.push((artifact.name.clone(), action));
        }

        let git = Git::open(&paths.repo_root())?;
        report.previous_hooks_path = git.hooks_path()?;
        report.hooks_path = paths.hooks_path_setting();
        git.set_hooks_path(&report.hooks_path)?;
        if report.previous_hooks_path.as_deref() != Some(report.hooks_path.as_str()) {
            info!(hooks_path = %report.hooks_path, "core.hooksPath reset");
        }

        Ok(report)
    }

    fn ensure_artifact(
        &self,
        artifact: &RuntimeArtifact,
        paths: &EnlistmentPaths,
    ) -> Result<ArtifactAction, RepairError> {
        let target = artifact.target_path(paths);
        let source = self.source_dir.as_ref().map(|dir| dir.join(&artifact.name));
        let target_exists = target.is_file();

        let source = match source {
            Some(source) if source.is_file() => source,
            Some(source) if !target_exists => {
                return Err(RepairError::SourceMissing {
                    name: artifact.name.clone(),
                    source_path: source,
                });
            }
            None if !target_exists => {
                return Err(RepairError::NoSourceDir {
                    name: artifact.name.clone(),
                });
            }
            _ => return Ok(ArtifactAction::KeptWithoutSource),
        };

        if target_exists {
            if file_digest(&source)? == file_digest(&target)? {
                return Ok(ArtifactAction::Unchanged);
            }
            install(&source, &target, artifact.executable)?;
            Ok(ArtifactAction::Replaced)
        } else {
            install(&source, &target, artifact.executable)?;
            Ok(ArtifactAction::Installed)
        }
    }
}

/// SHA-256 of a file's contents, hex encoded.
fn file_digest(path: &Path) -> Result<String, RepairError> {
    let bytes = fs::read(path).map_err(|source| RepairError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Copy `source` over `target` through a sibling temp file.
fn install(source: &Path, target: &Path, executable: bool) -> Result<(), RepairError> {
    let temp = target.with_extension("vmount-tmp");

    fs::copy(source, &temp).map_err(io_err(&temp))?;
    if executable {
        make_executable(&temp).map_err(io_err(&temp))?;
    }
    if let Err(e) = fs::rename(&temp, target) {
        let _ = fs::remove_file(&temp);
        return Err(io_err(target)(e));
    }
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> RepairError {
    let path = path.to_path_buf();
    move |source| RepairError::Io { path, source }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
