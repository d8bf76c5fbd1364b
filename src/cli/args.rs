//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vmount - mount manager for virtualized repository enlistments
#[derive(Parser, Debug)]
#[command(name = "vmount")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if vmount was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mount the enlistment containing the working directory
    #[command(
        long_about = "Mount the enlistment containing the working directory.\n\n\
            Mounting checks the enlistment's disk layout version against this build, \
            upgrades it when it is behind, restores missing hooks, and resets \
            core.hooksPath. Stale git lock files are removed in the background.\n\n\
            The mount is held until `vmount unmount` is run for the same enlistment.",
        after_help = "\
EXIT CODES:
    0   mounted
    3   generic failure
    4   already mounted
    5   not a valid enlistment
    6   metadata unreadable
    7   downgrade rejected
    8   layout too old
    9   upgrade failed
    10  artifact repair failed
    11  projection failed to start

    With --legacy-exit-codes, an existing mount exits 0 and every failure exits 3."
    )]
    Mount {
        /// Release the mount once background maintenance has finished
        #[arg(long)]
        no_wait: bool,

        /// Use the two-value exit code convention
        #[arg(long)]
        legacy_exit_codes: bool,
    },

    /// Ask the process holding a mount to release it
    Unmount {
        /// Use the two-value exit code convention
        #[arg(long)]
        legacy_exit_codes: bool,
    },

    /// Show mount state and disk layout version
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an empty enlistment
    Init {
        /// Directory to create the enlistment in
        path: PathBuf,

        /// Record this disk layout version instead of the current one
        #[arg(long, value_name = "VERSION")]
        layout_version: Option<u64>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion generation.
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
