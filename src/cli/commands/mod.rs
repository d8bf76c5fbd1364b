//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves the working directory and configuration
//! 2. Calls the engine
//! 3. Formats and displays output
//!
//! Handlers never change enlistment state except through the engine,
//! with one exception: `init` creates the enlistment the engine will later
//! validate.

mod completion;
mod init;
mod mount;
mod status;
mod unmount;

pub use completion::completion;
pub use init::init;
pub use mount::mount;
pub use status::status;
pub use unmount::unmount;

use super::args::Command;
use crate::engine::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Mount {
            no_wait,
            legacy_exit_codes,
        } => mount(ctx, no_wait, legacy_exit_codes),
        Command::Unmount { legacy_exit_codes } => unmount(ctx, legacy_exit_codes),
        Command::Status { json } => status(ctx, json),
        Command::Init {
            path,
            layout_version,
        } => init(ctx, &path, layout_version),
        Command::Completion { shell } => completion(shell),
    }
}
