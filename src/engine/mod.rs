//! engine
//!
//! Mount lifecycle and disk layout compatibility.
//!
//! # Architecture
//!
//! The engine turns a mount request into a live mount or a classified
//! failure:
//!
//! 1. **Resolve**: map the working directory to its enlistment
//! 2. **Acquire**: take the per-enlistment session ([`registry`])
//! 3. **Load**: read the persisted layout version
//! 4. **Gate**: accept, upgrade, or reject that version ([`gate`])
//! 5. **Repair**: restore runtime artifacts and the hooks path ([`repair`])
//! 6. **Activate**: hand off to the projection driver, then queue stale
//!    lock cleanup on the [`maintenance`] worker
//!
//! [`controller::MountController`] runs these steps; every failure is a
//! [`error::MountError`] with a stable kind and exit code.
//!
//! # Invariants
//!
//! - At most one live mount per enlistment
//! - A failed mount leaves no live session
//! - The persisted layout version changes only through a successful upgrade
//! - Repair is idempotent
//!
//! # Example
//!
//! ```ignore
//! use vmount::engine::MountController;
//!
//! let controller = MountController::builder().build()?;
//! match controller.mount(&cwd) {
//!     Ok(outcome) => println!("mounted {}", outcome.enlistment.root().display()),
//!     Err(e) => std::process::exit(e.exit_code(false)),
//! }
//! ```

pub mod controller;
pub mod driver;
pub mod error;
pub mod gate;
pub mod maintenance;
pub mod reconcile;
pub mod registry;
pub mod repair;

pub use controller::{MountController, MountControllerBuilder, MountOutcome, MountState, StatusReport};
pub use driver::{
    DriverError, MetadataUpgrader, PassthroughDriver, ProjectionDriver, UpgradeError, Upgrader,
};
pub use error::{ExitCode, MountError, MountErrorKind};
pub use gate::{classify, LayoutVerdict};
pub use maintenance::{MaintenanceQueue, MaintenanceStats, MaintenanceTask};
pub use reconcile::{ReconcileReport, StaleLockReconciler};
pub use registry::{AcquireOutcome, MountRegistry, MountSession};
pub use repair::{ArtifactAction, ArtifactRepair, RepairError, RepairReport, RuntimeArtifact};

use std::path::PathBuf;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// The directory requests resolve from.
    pub fn working_dir(&self) -> std::io::Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir(),
        }
    }
}
