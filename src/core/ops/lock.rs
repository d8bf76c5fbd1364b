//! core::ops::lock
//!
//! Exclusive per-enlistment mount lock.
//!
//! # Architecture
//!
//! The in-process registry decides exclusivity between callers that share
//! a coordinator. This lock extends the same guarantee across processes:
//! while an enlistment is mounted, its `.vmount/mount.lock` carries an
//! OS-level exclusive lock.
//!
//! The holder also keeps an exclusive lock on `.vmount/mount.held`.
//! Observers ([`MountLock::is_locked`]) probe that file with a shared lock,
//! so a status query can never make a competing mount lose the race for
//! `mount.lock`.
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast if locked)
//! - Only the winner of `mount.lock` ever locks `mount.held` exclusively
//! - Probes never lock `mount.lock`
//! - The lock is released on drop (RAII)
//! - Lock files are never deleted; only the OS locks matter
//!
//! # Example
//!
//! ```ignore
//! use vmount::core::ops::lock::MountLock;
//!
//! let lock = MountLock::acquire(enlistment.paths())?;
//! // ... enlistment stays mounted while `lock` lives ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::EnlistmentPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder already has the lock.
    #[error("enlistment is already mounted by another process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on an enlistment's mount.
#[derive(Debug)]
pub struct MountLock {
    path: PathBuf,
    /// Open handle holding the OS lock; `None` once released.
    file: Option<File>,
    /// Handle holding `mount.held`; released before `file`.
    held: Option<File>,
}

impl MountLock {
    /// Attempt to acquire the mount lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another holder has the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(paths: &EnlistmentPaths) -> Result<Self, LockError> {
        let dot_dir = paths.dot_dir();
        fs::create_dir_all(&dot_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dot_dir.display(), e))
        })?;

        let path = paths.mount_lock_path();
        let file = open_lock_file(&path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(LockError::AlreadyLocked);
            }
            Err(e) => return Err(LockError::AcquireFailed(e.to_string())),
        }

        // Observers hold `mount.held` shared for at most one probe.
        let held_path = paths.mount_held_path();
        let held = open_lock_file(&held_path)?;
        FileExt::lock_exclusive(&held).map_err(|e| {
            LockError::AcquireFailed(format!("cannot lock {}: {}", held_path.display(), e))
        })?;

        Ok(Self {
            path,
            file: Some(file),
            held: Some(held),
        })
    }

    /// Try to acquire the lock, returning `None` if already held.
    pub fn try_acquire(paths: &EnlistmentPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Probe whether some holder currently has the lock.
    ///
    /// Takes a shared lock on `mount.held` for the duration of the check and
    /// never touches `mount.lock`.
    pub fn is_locked(paths: &EnlistmentPaths) -> Result<bool, LockError> {
        let held_path = paths.mount_held_path();
        let file = match File::open(&held_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(LockError::AcquireFailed(format!(
                    "cannot open {}: {}",
                    held_path.display(),
                    e
                )))
            }
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(true),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(held) = self.held.take() {
            FileExt::unlock(&held)
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file)
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))
}

impl Drop for MountLock {
    fn drop(&mut self) {
        if let Some(held) = self.held.take() {
            let _ = FileExt::unlock(&held);
        }
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}
