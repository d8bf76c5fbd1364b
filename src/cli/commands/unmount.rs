//! unmount command - Ask the mount holder to release

use crate::cli::MountFailure;
use crate::core::config::Config;
use crate::core::enlistment::Enlistment;
use crate::core::ops::MountLock;
use crate::engine::{Context, MountError};
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};
use std::fs;
use std::thread;
use std::time::Instant;

/// Request release of the mount on the enlistment containing the working
/// directory, then wait for the holder to let go of the mount lock.
pub fn unmount(ctx: &Context, legacy_exit_codes: bool) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let cwd = ctx
        .working_dir()
        .context("Failed to determine working directory")?;
    let config = Config::load(None).context("Failed to load configuration")?;
    let legacy = legacy_exit_codes || config.legacy_exit_codes();

    let enlistment = Enlistment::discover(&cwd).map_err(|_| {
        MountFailure::new(MountError::InvalidEnlistment { path: cwd.clone() }, legacy)
    })?;
    let paths = enlistment.paths();

    if !MountLock::is_locked(paths).context("Failed to probe mount lock")? {
        return Err(MountFailure::new(
            MountError::NotMounted {
                root: enlistment.root().to_path_buf(),
            },
            legacy,
        )
        .into());
    }

    let request = paths.unmount_request_path();
    fs::write(&request, b"")
        .with_context(|| format!("Failed to write {}", request.display()))?;

    let deadline = Instant::now() + config.maintenance_timeout();
    while MountLock::is_locked(paths).context("Failed to probe mount lock")? {
        if Instant::now() >= deadline {
            let _ = fs::remove_file(&request);
            bail!(
                "Timed out waiting for the mount on '{}' to be released",
                enlistment.root().display()
            );
        }
        thread::sleep(config.unmount_poll_interval());
    }

    output::print(
        format!("Unmounted {}", enlistment.root().display()),
        verbosity,
    );
    Ok(())
}
