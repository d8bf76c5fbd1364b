//! mount command - Mount and hold an enlistment

use crate::cli::MountFailure;
use crate::core::config::Config;
use crate::core::paths::EnlistmentPaths;
use crate::engine::{ArtifactAction, Context, MountController, MountOutcome};
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Mount the enlistment containing the working directory.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `no_wait` - Release as soon as background maintenance has drained
/// * `legacy_exit_codes` - Use the two-value exit code convention
pub fn mount(ctx: &Context, no_wait: bool, legacy_exit_codes: bool) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let cwd = ctx
        .working_dir()
        .context("Failed to determine working directory")?;
    let config = Config::load(None).context("Failed to load configuration")?;
    if let Some(path) = config.global_config_loaded_from() {
        debug!(path = %path.display(), "global config loaded");
    }
    let legacy = legacy_exit_codes || config.legacy_exit_codes();

    let mut builder = MountController::builder();
    if let Some(dir) = config.hooks_source_dir() {
        builder = builder.hooks_source_dir(dir);
    }
    let controller = builder
        .build()
        .context("Failed to start maintenance worker")?;

    let outcome = controller
        .mount(&cwd)
        .map_err(|e| MountFailure::new(e, legacy))?;
    report(&outcome, verbosity);

    if !controller.wait_for_idle(config.maintenance_timeout()) {
        output::warn(
            "background maintenance is still running; stale locks will be retried on next mount",
            verbosity,
        );
    }

    if no_wait {
        controller
            .release(&outcome.enlistment)
            .map_err(|e| MountFailure::new(e, legacy))?;
        return Ok(());
    }

    output::print("Holding mount; run `vmount unmount` to release it", verbosity);
    let end = hold(outcome.enlistment.paths(), config.unmount_poll_interval())?;
    controller
        .release(&outcome.enlistment)
        .map_err(|e| MountFailure::new(e, legacy))?;

    match end {
        HoldEnd::Requested => {
            output::print(
                format!("Unmounted {}", outcome.enlistment.root().display()),
                verbosity,
            );
            Ok(())
        }
        HoldEnd::Removed => bail!(
            "Enlistment '{}' was removed while mounted",
            outcome.enlistment.root().display()
        ),
    }
}

/// Why a held mount stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldEnd {
    /// `vmount unmount` wrote the request file.
    Requested,
    /// The enlistment's `.vmount` directory disappeared.
    Removed,
}

/// Block until an unmount request arrives or the enlistment goes away.
fn hold(paths: &EnlistmentPaths, interval: Duration) -> Result<HoldEnd> {
    let request = paths.unmount_request_path();
    loop {
        if request.exists() {
            debug!(path = %request.display(), "unmount requested");
            clear_request(&request)?;
            return Ok(HoldEnd::Requested);
        }
        if !paths.dot_dir().is_dir() {
            warn!(root = %paths.root().display(), "enlistment removed while mounted");
            return Ok(HoldEnd::Removed);
        }
        thread::sleep(interval);
    }
}

fn report(outcome: &MountOutcome, verbosity: Verbosity) {
    output::print(
        format!(
            "Mounted {} (disk layout version {})",
            outcome.enlistment.root().display(),
            outcome.layout_version
        ),
        verbosity,
    );
    if let Some(from) = outcome.upgraded_from {
        output::print(
            format!(
                "Upgraded disk layout from version {} to {}",
                from, outcome.layout_version
            ),
            verbosity,
        );
    }
    for (name, action) in &outcome.repair.artifacts {
        if matches!(action, ArtifactAction::Installed | ArtifactAction::Replaced) {
            output::print(format!("Restored {}: {}", name, action), verbosity);
        }
    }
}

fn clear_request(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
