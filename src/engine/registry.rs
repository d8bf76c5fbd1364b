//! engine::registry
//!
//! Mount exclusivity coordinator.
//!
//! # Architecture
//!
//! [`MountRegistry`] owns every live [`MountSession`] of a process, keyed
//! by [`EnlistmentId`] (the canonical enlistment root). Every working
//! directory inside an enlistment resolves to the same id, so a second
//! mount from a nested path collides with the first.
//!
//! Within one process exclusivity comes from the registry mutex. Across
//! processes it comes from the [`MountLock`] each live entry holds on
//! `.vmount/mount.lock`. The session marker written next to it is advisory
//! and only serves status queries from other processes.
//!
//! # Invariants
//!
//! - At most one live session per enlistment
//! - A live entry always holds the OS lock
//! - Release drops the lock and removes the marker
//!
//! # Example
//!
//! ```ignore
//! use vmount::engine::registry::{AcquireOutcome, MountRegistry};
//!
//! let registry = MountRegistry::new();
//! match registry.try_acquire(&enlistment)? {
//!     AcquireOutcome::Acquired(session) => println!("mounted as {}", session.id),
//!     AcquireOutcome::AlreadyMounted => println!("already mounted"),
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::enlistment::Enlistment;
use crate::core::ops::{LockError, MountLock};
use crate::core::paths::EnlistmentPaths;
use crate::core::types::{EnlistmentId, SessionId};

/// One live mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountSession {
    /// Unique id of this session.
    pub id: SessionId,
    /// Process holding the mount.
    pub pid: u32,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
}

impl MountSession {
    fn start() -> Self {
        Self {
            id: SessionId::new(),
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

/// Result of [`MountRegistry::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new session was created.
    Acquired(MountSession),
    /// A session already exists, in this process or another.
    AlreadyMounted,
}

#[derive(Debug)]
struct LiveMount {
    session: MountSession,
    paths: EnlistmentPaths,
    lock: MountLock,
}

/// Registry of live mount sessions.
#[derive(Debug, Default)]
pub struct MountRegistry {
    live: Mutex<HashMap<EnlistmentId, LiveMount>>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<EnlistmentId, LiveMount>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session for `enlistment` unless one already exists.
    ///
    /// # Errors
    ///
    /// Returns a [`LockError`] only when the OS lock cannot be taken for a
    /// reason other than contention.
    pub fn try_acquire(&self, enlistment: &Enlistment) -> Result<AcquireOutcome, LockError> {
        let mut live = self.live();
        if live.contains_key(enlistment.id()) {
            debug!(enlistment = %enlistment.id(), "session exists in this process");
            return Ok(AcquireOutcome::AlreadyMounted);
        }

        let lock = match MountLock::try_acquire(enlistment.paths())? {
            Some(lock) => lock,
            None => {
                debug!(enlistment = %enlistment.id(), "mount lock held by another process");
                return Ok(AcquireOutcome::AlreadyMounted);
            }
        };

        clear_stale_request(enlistment.paths());
        let session = MountSession::start();
        if let Err(e) = write_marker(enlistment.paths(), &session) {
            warn!(enlistment = %enlistment.id(), error = %e, "cannot write session marker");
        }

        live.insert(
            enlistment.id().clone(),
            LiveMount {
                session: session.clone(),
                paths: enlistment.paths().clone(),
                lock,
            },
        );
        Ok(AcquireOutcome::Acquired(session))
    }

    /// Destroy the session for `id`, returning it if one existed.
    pub fn release(&self, id: &EnlistmentId) -> Option<MountSession> {
        let LiveMount {
            session,
            paths,
            mut lock,
        } = self.live().remove(id)?;

        if let Err(e) = fs::remove_file(paths.session_marker_path()) {
            if e.kind() != ErrorKind::NotFound {
                warn!(enlistment = %id, error = %e, "cannot remove session marker");
            }
        }
        if let Err(e) = lock.release() {
            warn!(enlistment = %id, error = %e, "mount lock release failed");
        }
        Some(session)
    }

    /// Whether this registry holds a session for `id`.
    pub fn is_mounted(&self, id: &EnlistmentId) -> bool {
        self.live().contains_key(id)
    }

    /// The live session for `id`, if any.
    pub fn session(&self, id: &EnlistmentId) -> Option<MountSession> {
        self.live().get(id).map(|m| m.session.clone())
    }

    /// Number of live sessions.
    pub fn live_count(&self) -> usize {
        self.live().len()
    }
}

/// An unmount request left behind by an earlier session must not end the
/// new one.
fn clear_stale_request(paths: &EnlistmentPaths) {
    let path = paths.unmount_request_path();
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "cannot clear stale unmount request");
        }
    }
}

fn write_marker(paths: &EnlistmentPaths, session: &MountSession) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    fs::write(paths.session_marker_path(), json)
}

/// Read the session marker of an enlistment, if present and well formed.
///
/// The marker is advisory; pair it with [`MountLock::is_locked`] before
/// trusting it.
pub fn read_marker(paths: &EnlistmentPaths) -> Option<MountSession> {
    let contents = fs::read_to_string(paths.session_marker_path()).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn enlistment() -> (TempDir, Enlistment) {
        let temp = TempDir::new().unwrap();
        let paths = EnlistmentPaths::new(temp.path().to_path_buf());
        fs::create_dir_all(paths.dot_dir()).unwrap();
        fs::create_dir_all(paths.repo_root()).unwrap();
        let enlistment = Enlistment::open(temp.path()).unwrap();
        (temp, enlistment)
    }

    #[test]
    fn acquire_then_release() {
        let (_temp, e) = enlistment();
        let registry = MountRegistry::new();

        let session = match registry.try_acquire(&e).unwrap() {
            AcquireOutcome::Acquired(s) => s,
            other => panic!("expected Acquired, got {other:?}"),
        };
        assert_eq!(session.pid, std::process::id());
        assert!(registry.is_mounted(e.id()));
        assert_eq!(registry.session(e.id()), Some(session.clone()));
        assert_eq!(read_marker(e.paths()), Some(session.clone()));

        assert_eq!(registry.release(e.id()), Some(session));
        assert!(!registry.is_mounted(e.id()));
        assert!(!e.paths().session_marker_path().exists());
        assert!(!MountLock::is_locked(e.paths()).unwrap());
    }

    #[test]
    fn second_acquire_is_already_mounted() {
        let (_temp, e) = enlistment();
        let registry = MountRegistry::new();

        assert!(matches!(
            registry.try_acquire(&e).unwrap(),
            AcquireOutcome::Acquired(_)
        ));
        assert_eq!(
            registry.try_acquire(&e).unwrap(),
            AcquireOutcome::AlreadyMounted
        );
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn nested_path_resolves_to_same_session() {
        let (temp, e) = enlistment();
        let nested_dir = e.paths().repo_root().join("deep/dir");
        fs::create_dir_all(&nested_dir).unwrap();
        let nested = Enlistment::discover(&nested_dir).unwrap();
        assert_eq!(nested.id(), e.id());

        let registry = MountRegistry::new();
        registry.try_acquire(&e).unwrap();
        assert_eq!(
            registry.try_acquire(&nested).unwrap(),
            AcquireOutcome::AlreadyMounted
        );
        drop(temp);
    }

    #[test]
    fn separate_registries_collide_through_os_lock() {
        let (_temp, e) = enlistment();
        let first = MountRegistry::new();
        let second = MountRegistry::new();

        assert!(matches!(
            first.try_acquire(&e).unwrap(),
            AcquireOutcome::Acquired(_)
        ));
        assert_eq!(
            second.try_acquire(&e).unwrap(),
            AcquireOutcome::AlreadyMounted
        );

        first.release(e.id());
        assert!(matches!(
            second.try_acquire(&e).unwrap(),
            AcquireOutcome::Acquired(_)
        ));
    }

    #[test]
    fn acquire_clears_leftover_unmount_request() {
        let (_temp, e) = enlistment();
        fs::write(e.paths().unmount_request_path(), "").unwrap();

        MountRegistry::new().try_acquire(&e).unwrap();
        assert!(!e.paths().unmount_request_path().exists());
    }

    #[test]
    fn release_unknown_is_none() {
        let (_temp, e) = enlistment();
        assert_eq!(MountRegistry::new().release(e.id()), None);
    }

    #[test]
    fn concurrent_acquire_has_one_winner() {
        let (_temp, e) = enlistment();
        let registry = Arc::new(MountRegistry::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let e = e.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.try_acquire(&e).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = outcomes
            .iter()
            .filter(|o| matches!(o, AcquireOutcome::Acquired(_)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn status_probes_do_not_cause_false_rejections() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (_temp, e) = enlistment();
        let registry = MountRegistry::new();
        let stop = Arc::new(AtomicBool::new(false));
        let prober = {
            let paths = e.paths().clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    MountLock::is_locked(&paths).unwrap();
                }
            })
        };

        let mut rejected = 0;
        for _ in 0..2_000 {
            match registry.try_acquire(&e).unwrap() {
                AcquireOutcome::Acquired(_) => {
                    registry.release(e.id());
                }
                AcquireOutcome::AlreadyMounted => rejected += 1,
            }
        }
        stop.store(true, Ordering::Relaxed);
        prober.join().unwrap();
        assert_eq!(rejected, 0);
    }

    #[test]
    fn corrupt_marker_reads_as_none() {
        let (_temp, e) = enlistment();
        fs::write(e.paths().session_marker_path(), "not json").unwrap();
        assert_eq!(read_marker(e.paths()), None);
    }
}
