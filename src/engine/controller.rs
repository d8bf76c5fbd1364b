//! engine::controller
//!
//! Mount lifecycle.
//!
//! # Architecture
//!
//! [`MountController`] drives one mount request through a fixed sequence of
//! states on the caller's thread:
//!
//! ```text
//! Unmounted -> Acquiring -> LoadingMetadata -> GatingVersion -> Repairing -> Active
//! ```
//!
//! Enlistment resolution happens before `Acquiring`, so a directory outside
//! every enlistment fails without touching any mount state. From
//! `Acquiring` on, a failure releases the session before the error is
//! returned. Only a mount that reaches `Active` hands off to the projection
//! driver and queues stale lock cleanup.
//!
//! # Invariants
//!
//! - A failed mount leaves no live session behind
//! - The upgrader is called only for a `NeedsUpgrade` verdict
//! - After an upgrade the persisted version is re-read and must equal the
//!   current version
//! - Every mount resets `core.hooksPath`
//!
//! # Example
//!
//! ```ignore
//! use vmount::engine::controller::MountController;
//!
//! let controller = MountController::builder()
//!     .hooks_source_dir(bundle_dir)
//!     .build()?;
//! let outcome = controller.mount(&cwd)?;
//! controller.wait_for_idle(Duration::from_secs(30));
//! controller.unmount(&cwd)?;
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::enlistment::Enlistment;
use crate::core::metadata::{MetadataStore, RepoMetadataV1};
use crate::core::ops::MountLock;
use crate::core::paths::EnlistmentPaths;
use crate::core::types::{LayoutRange, LayoutVersion};

use super::driver::{MetadataUpgrader, PassthroughDriver, ProjectionDriver, Upgrader};
use super::error::MountError;
use super::gate::{classify, LayoutVerdict};
use super::maintenance::{MaintenanceQueue, MaintenanceTask};
use super::reconcile::StaleLockReconciler;
use super::registry::{read_marker, AcquireOutcome, MountRegistry, MountSession};
use super::repair::{ArtifactRepair, RepairReport};

/// Lifecycle state of a mount request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Acquiring,
    LoadingMetadata,
    GatingVersion,
    Repairing,
    Active,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MountState::Unmounted => "unmounted",
            MountState::Acquiring => "acquiring",
            MountState::LoadingMetadata => "loading-metadata",
            MountState::GatingVersion => "gating-version",
            MountState::Repairing => "repairing",
            MountState::Active => "active",
        };
        f.write_str(s)
    }
}

/// A mount that reached `Active`.
#[derive(Debug, Clone)]
pub struct MountOutcome {
    pub enlistment: Enlistment,
    pub session: MountSession,
    /// Layout version on disk once mounted.
    pub layout_version: LayoutVersion,
    /// Set when an upgrade ran during this mount.
    pub upgraded_from: Option<LayoutVersion>,
    pub repair: RepairReport,
}

/// Answer to a status query.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub enlistment: Enlistment,
    /// Whether any process holds the mount.
    pub mounted: bool,
    /// Session details, from this process or the advisory marker.
    pub session: Option<MountSession>,
    /// Persisted layout version, if readable.
    pub layout_version: Option<LayoutVersion>,
    /// Why the layout version could not be read.
    pub layout_error: Option<String>,
    /// Classification of the persisted version against this build.
    pub verdict: Option<LayoutVerdict>,
}

struct Prepared {
    layout_version: LayoutVersion,
    upgraded_from: Option<LayoutVersion>,
    repair: RepairReport,
    extra_lock_files: Vec<String>,
}

/// Builder for [`MountController`].
#[derive(Default)]
pub struct MountControllerBuilder {
    registry: Option<Arc<MountRegistry>>,
    maintenance: Option<Arc<MaintenanceQueue>>,
    driver: Option<Arc<dyn ProjectionDriver>>,
    upgrader: Option<Arc<dyn Upgrader>>,
    range: Option<LayoutRange>,
    hooks_source_dir: Option<PathBuf>,
}

impl MountControllerBuilder {
    /// Share a registry with other controllers.
    pub fn registry(mut self, registry: Arc<MountRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn maintenance(mut self, queue: Arc<MaintenanceQueue>) -> Self {
        self.maintenance = Some(queue);
        self
    }

    pub fn driver(mut self, driver: Arc<dyn ProjectionDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn upgrader(mut self, upgrader: Arc<dyn Upgrader>) -> Self {
        self.upgrader = Some(upgrader);
        self
    }

    /// Supported layout range. Defaults to [`LayoutRange::this_build`].
    pub fn layout_range(mut self, range: LayoutRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Directory holding the bundled runtime artifacts.
    pub fn hooks_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.hooks_source_dir = Some(dir.into());
        self
    }

    /// Build the controller, starting a maintenance worker if none was
    /// supplied.
    pub fn build(self) -> io::Result<MountController> {
        let maintenance = match self.maintenance {
            Some(queue) => queue,
            None => Arc::new(MaintenanceQueue::start()?),
        };
        Ok(MountController {
            registry: self.registry.unwrap_or_default(),
            maintenance,
            driver: self.driver.unwrap_or_else(|| Arc::new(PassthroughDriver)),
            upgrader: self.upgrader.unwrap_or_else(|| Arc::new(MetadataUpgrader)),
            range: self.range.unwrap_or_default(),
            hooks_source_dir: self.hooks_source_dir,
        })
    }
}

/// Drives mount, unmount and status requests.
pub struct MountController {
    registry: Arc<MountRegistry>,
    maintenance: Arc<MaintenanceQueue>,
    driver: Arc<dyn ProjectionDriver>,
    upgrader: Arc<dyn Upgrader>,
    range: LayoutRange,
    hooks_source_dir: Option<PathBuf>,
}

impl fmt::Debug for MountController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountController")
            .field("registry", &self.registry)
            .field("range", &self.range)
            .field("hooks_source_dir", &self.hooks_source_dir)
            .finish_non_exhaustive()
    }
}

impl MountController {
    pub fn builder() -> MountControllerBuilder {
        MountControllerBuilder::default()
    }

    pub fn registry(&self) -> &Arc<MountRegistry> {
        &self.registry
    }

    pub fn layout_range(&self) -> LayoutRange {
        self.range
    }

    /// Mount the enlistment containing `cwd`.
    ///
    /// Returns once the mount is `Active`. Stale lock cleanup continues in
    /// the background; see [`MountController::wait_for_idle`].
    ///
    /// # Errors
    ///
    /// Returns the [`MountError`] of the first failing state. The session
    /// is released before returning.
    pub fn mount(&self, cwd: &Path) -> Result<MountOutcome, MountError> {
        let enlistment = resolve(cwd)?;
        let id = enlistment.id().clone();
        transition(&enlistment, MountState::Acquiring);

        let session = match self.registry.try_acquire(&enlistment) {
            Ok(AcquireOutcome::Acquired(session)) => session,
            Ok(AcquireOutcome::AlreadyMounted) => {
                return Err(MountError::AlreadyMounted {
                    root: enlistment.root().to_path_buf(),
                });
            }
            Err(e) => {
                return Err(MountError::Coordinator {
                    detail: e.to_string(),
                });
            }
        };

        let prepared = match self.prepare(&enlistment) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.registry.release(&id);
                warn!(enlistment = %id, kind = %e.kind(), state = %e.detected_in(), "mount failed");
                return Err(e);
            }
        };

        transition(&enlistment, MountState::Active);
        if let Err(e) = self.driver.start_projecting(&enlistment) {
            self.registry.release(&id);
            warn!(enlistment = %id, error = %e, "projection failed to start");
            return Err(MountError::DriverStartFailed {
                detail: e.to_string(),
            });
        }

        let reconciler =
            StaleLockReconciler::for_enlistment(enlistment.paths(), &prepared.extra_lock_files);
        self.maintenance
            .enqueue(MaintenanceTask::ReconcileStaleLocks(reconciler));

        info!(
            enlistment = %id,
            session = %session.id,
            layout_version = %prepared.layout_version,
            "mounted"
        );
        Ok(MountOutcome {
            enlistment,
            session,
            layout_version: prepared.layout_version,
            upgraded_from: prepared.upgraded_from,
            repair: prepared.repair,
        })
    }

    /// States between a taken session and `Active`.
    fn prepare(&self, enlistment: &Enlistment) -> Result<Prepared, MountError> {
        let paths = enlistment.paths();
        let store = MetadataStore::new(paths);

        transition(enlistment, MountState::LoadingMetadata);
        let record = store.load().map_err(|e| MountError::MetadataUnreadable {
            path: paths.metadata_path(),
            detail: e.to_string(),
        })?;
        let persisted = record.disk_layout_version;

        transition(enlistment, MountState::GatingVersion);
        let verdict = classify(persisted, &self.range);
        debug!(enlistment = %enlistment.id(), %persisted, ?verdict, "layout gated");
        if let Some(rejection) = verdict.rejection() {
            return Err(rejection);
        }

        let mut upgraded_from = None;
        if let LayoutVerdict::NeedsUpgrade { from, to } = verdict {
            if let Err(detail) = self.run_upgrade(paths, &store, from, to) {
                restore_record(enlistment, &store, &record);
                return Err(MountError::UpgradeFailed { from, to, detail });
            }
            info!(enlistment = %enlistment.id(), %from, %to, "layout upgraded");
            upgraded_from = Some(from);
        }

        transition(enlistment, MountState::Repairing);
        let config = Config::load_from(None, Some(enlistment.root())).map_err(|e| {
            MountError::RepairFailed {
                detail: format!("enlistment config: {e}"),
            }
        })?;
        let repair = ArtifactRepair::new(self.hooks_source_dir.clone(), &config.hook_names())
            .ensure(paths)
            .map_err(|e| MountError::RepairFailed {
                detail: e.to_string(),
            })?;

        Ok(Prepared {
            layout_version: self.range.current(),
            upgraded_from,
            repair,
            extra_lock_files: config.extra_lock_files(),
        })
    }

    /// Run the upgrader and check that it left the record at `to`.
    fn run_upgrade(
        &self,
        paths: &EnlistmentPaths,
        store: &MetadataStore<'_>,
        from: LayoutVersion,
        to: LayoutVersion,
    ) -> Result<(), String> {
        self.upgrader
            .upgrade(paths, from, to)
            .map_err(|e| e.to_string())?;

        let after = store
            .load()
            .map_err(|e| format!("cannot re-read layout version: {e}"))?
            .disk_layout_version;
        if after != to {
            return Err(format!("layout version on disk is {after} after upgrade"));
        }
        Ok(())
    }

    /// Unmount the enlistment containing `cwd`.
    ///
    /// # Errors
    ///
    /// [`MountError::NotMounted`] if this controller holds no session for
    /// the enlistment.
    pub fn unmount(&self, cwd: &Path) -> Result<MountSession, MountError> {
        self.release(&resolve(cwd)?)
    }

    /// Unmount an already resolved enlistment.
    ///
    /// Works after the enlistment directory is gone, since nothing here
    /// re-discovers it.
    pub fn release(&self, enlistment: &Enlistment) -> Result<MountSession, MountError> {
        let not_mounted = || MountError::NotMounted {
            root: enlistment.root().to_path_buf(),
        };
        if !self.registry.is_mounted(enlistment.id()) {
            return Err(not_mounted());
        }

        if let Err(e) = self.driver.stop_projecting(enlistment) {
            warn!(enlistment = %enlistment.id(), error = %e, "projection failed to stop cleanly");
        }
        let session = self
            .registry
            .release(enlistment.id())
            .ok_or_else(not_mounted)?;
        transition(enlistment, MountState::Unmounted);
        info!(enlistment = %enlistment.id(), session = %session.id, "unmounted");
        Ok(session)
    }

    /// Report the mount state of the enlistment containing `cwd`.
    pub fn status(&self, cwd: &Path) -> Result<StatusReport, MountError> {
        let enlistment = resolve(cwd)?;
        let paths = enlistment.paths();

        let local = self.registry.session(enlistment.id());
        let mounted = local.is_some()
            || MountLock::is_locked(paths).map_err(|e| MountError::Coordinator {
                detail: e.to_string(),
            })?;
        let session = match local {
            Some(session) => Some(session),
            None if mounted => read_marker(paths),
            None => None,
        };

        let (layout_version, layout_error) = match MetadataStore::new(paths).load() {
            Ok(meta) => (Some(meta.disk_layout_version), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let verdict = layout_version.map(|v| classify(v, &self.range));

        Ok(StatusReport {
            enlistment,
            mounted,
            session,
            layout_version,
            layout_error,
            verdict,
        })
    }

    /// Wait up to `timeout` for background maintenance to finish.
    ///
    /// Returns `true` only if nothing is pending.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        self.maintenance.wait_for_idle(timeout)
    }
}

fn resolve(cwd: &Path) -> Result<Enlistment, MountError> {
    Enlistment::discover(cwd).map_err(|e| {
        debug!(cwd = %cwd.display(), error = %e, "enlistment not found");
        MountError::InvalidEnlistment {
            path: cwd.to_path_buf(),
        }
    })
}

/// Put back the record read before a failed upgrade.
fn restore_record(enlistment: &Enlistment, store: &MetadataStore<'_>, record: &RepoMetadataV1) {
    match store.save(record) {
        Ok(()) => debug!(
            enlistment = %enlistment.id(),
            version = %record.disk_layout_version,
            "layout record restored after failed upgrade"
        ),
        Err(e) => warn!(
            enlistment = %enlistment.id(),
            error = %e,
            "cannot restore layout record after failed upgrade"
        ),
    }
}

fn transition(enlistment: &Enlistment, state: MountState) {
    debug!(enlistment = %enlistment.id(), %state, "mount state");
}
