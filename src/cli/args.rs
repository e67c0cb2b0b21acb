//! Command line arguments for gpkg-verifier.
//!
//! Parsed with clap derive. Flags given here override values from the
//! configuration file (see [`crate::VerifierConfig::from_args`]).

use crate::{Subsystem, VerificationLevel};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gpkg-verifier")]
#[command(about = "Verify GeoPackage files against the GeoPackage Encoding Standard", long_about = None)]
pub struct Cli {
    /// Enable verbose (info-level) logging to stderr.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Enable debug-level logging to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify one or more GeoPackage files.
    Verify(VerifyArgs),

    /// List the requirements checked by each subsystem.
    List(ListArgs),

    /// Print version and build information.
    Version,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct VerifyArgs {
    /// GeoPackage files to verify.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Only verify this subsystem (repeatable).
    #[arg(long = "subsystem", value_parser = parse_subsystem)]
    pub subsystems: Vec<Subsystem>,

    /// Verification depth.
    #[arg(long, value_enum)]
    pub level: Option<VerificationLevel>,

    /// Lowest severity that produces a failing exit code.
    #[arg(long, value_enum)]
    pub fail_on: Option<FailOn>,

    /// Write the report to a file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Maximum number of files verified at the same time.
    #[arg(long, short = 'j', value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub jobs: Option<usize>,

    /// Path to a TOML config file. Falls back to $GPKG_VERIFIER_CONFIG.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable colored summaries.
    #[arg(long)]
    pub no_color: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only list this subsystem (repeatable).
    #[arg(long = "subsystem", value_parser = parse_subsystem)]
    pub subsystems: Vec<Subsystem>,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text issue report
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
    /// JUnit XML for CI/CD integration
    Junit,
}

/// Lowest severity that fails the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    /// Exit non-zero on error-severity issues
    #[default]
    Error,
    /// Exit non-zero on any issue
    Warning,
    /// Only runtime errors fail the run
    Never,
}

/// Parse one of the five fixed subsystem names (case-insensitive)
pub fn parse_subsystem(s: &str) -> Result<Subsystem, String> {
    s.parse()
}
