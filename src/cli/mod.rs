//! CLI module for argument parsing, logging setup, and output formatting.

pub mod args;
pub mod output;

use crate::engine::result::VerificationRun;
use args::FailOn;
use tracing::debug;

/// Exit code: nothing at or above the fail threshold
pub const EXIT_OK: u8 = 0;
/// Exit code: error-severity issues found
pub const EXIT_ERRORS: u8 = 1;
/// Exit code: warnings only, with `--fail-on warning`
pub const EXIT_WARNINGS: u8 = 2;
/// Exit code: invalid input, open failure, or a subsystem that could not run
pub const EXIT_RUNTIME: u8 = 3;

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` takes precedence over the flags.
pub fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}

/// Exit code for a finished batch of runs
pub fn exit_code_for(runs: &[VerificationRun], fail_on: FailOn, runtime_error: bool) -> u8 {
    if runtime_error || runs.iter().any(VerificationRun::has_failures) {
        return EXIT_RUNTIME;
    }

    let errors: usize = runs.iter().map(|run| run.summary().errors).sum();
    let warnings: usize = runs.iter().map(|run| run.summary().warnings).sum();

    match fail_on {
        FailOn::Never => EXIT_OK,
        _ if errors > 0 => EXIT_ERRORS,
        FailOn::Warning if warnings > 0 => EXIT_WARNINGS,
        _ => EXIT_OK,
    }
}
