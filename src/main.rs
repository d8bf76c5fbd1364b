//! vmount binary entry point.
//!
//! Parses arguments, installs the tracing subscriber, runs the command,
//! and turns its result into a process exit code.

use std::process;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmount::cli::{self, Cli};
use vmount::ui::output::Verbosity;

fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let code = match cli::run(cli) {
        Ok(()) => 0,
        Err(err) => cli::report_failure(&err, verbosity),
    };
    process::exit(code);
}

/// Log to stderr. `RUST_LOG` wins; otherwise `--debug` lowers the floor
/// from `warn` to `debug`.
fn init_tracing(debug: bool) {
    let default = if debug { "vmount=debug" } else { "vmount=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
