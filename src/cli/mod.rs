//! cli
//!
//! Command-line interface layer for vmount.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Map failures to process exit codes
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`], which owns the mount lifecycle. Mount failures travel
//! up as [`MountFailure`] inside `anyhow::Error` so [`exit_code`] can
//! recover the classified code; any other error exits with the generic code.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::engine::{self, ExitCode, MountError};
use crate::ui::output::{self, Verbosity};
use anyhow::Result;

/// A classified mount failure and the exit code it maps to.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct MountFailure {
    pub error: MountError,
    pub code: i32,
}

impl MountFailure {
    /// Classify `error` under the chosen exit code convention.
    pub fn new(error: MountError, legacy: bool) -> Self {
        let code = error.exit_code(legacy);
        Self { error, code }
    }
}

/// Exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<MountFailure>()
        .map(|f| f.code)
        .unwrap_or(ExitCode::GenericError.code())
}

/// Print a failed command's error and return its exit code.
///
/// A failure that exits successfully (already mounted, under legacy exit
/// codes) is ordinary output on stdout rather than an error.
pub fn report_failure(err: &anyhow::Error, verbosity: Verbosity) -> i32 {
    let code = exit_code(err);
    if code == ExitCode::Success.code() {
        output::print(format!("{err:#}"), verbosity);
    } else {
        output::error(format!("{err:#}"));
    }
    code
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
