//! gpkg-verifier library
//!
//! GeoPackage conformance verification.
//!
//! A file is opened once, then every subsystem (Core, Tiles, Extensions,
//! Schema, Metadata) is verified on its own worker thread. Results are
//! aggregated into a [`ResultSet`] keyed by subsystem and rendered as a
//! deterministic text report.
//!
//! # Example
//!
//! ```no_run
//! use gpkg_verifier::{verify_file, VerifierConfig};
//! use std::path::Path;
//!
//! let config = VerifierConfig::default();
//! let run = verify_file(Path::new("world.gpkg"), &config).expect("verification failed");
//! if run.has_issues() {
//!     println!("{}", run.report());
//! }
//! ```

pub mod checks;
pub mod cli;
pub mod engine;
pub mod geopackage;
pub mod version;

use cli::args::{FailOn, OutputFormat, VerifyArgs};
use engine::orchestrator::{OrchestratorConfig, VerificationHandle, VerificationOrchestrator};
use geopackage::GeoPackageEngine;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

// Re-exports for public API
pub use engine::report::{render, ReportHeader};
pub use engine::result::{ResultSet, SubsystemOutcome, VerificationRun};
pub use engine::VerificationEngine;

/// Environment variable naming a TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "GPKG_VERIFIER_CONFIG";

/// Severity of a requirement violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Deviation from a recommendation; the file is still usable
    Warning,
    /// Violation of a mandatory requirement
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// Depth of a conformance check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    /// No requirement checks are evaluated
    None,
    /// Every requirement check is evaluated
    #[default]
    Full,
}

/// A requirement from the GeoPackage standard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Requirement {
    /// Reference identifier (e.g., "Requirement 2")
    pub reference: String,
    /// Requirement text
    pub text: String,
    /// Severity assigned to a violation
    pub severity: Severity,
}

impl Requirement {
    pub fn new(reference: impl Into<String>, text: impl Into<String>, severity: Severity) -> Self {
        Requirement {
            reference: reference.into(),
            text: text.into(),
            severity,
        }
    }
}

/// One detected non-conformance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationIssue {
    requirement: Requirement,
    severity: Severity,
    reason: String,
}

impl VerificationIssue {
    /// Create an issue carrying the requirement's own severity
    pub fn new(requirement: Requirement, reason: impl Into<String>) -> Self {
        let severity = requirement.severity;
        VerificationIssue {
            requirement,
            severity,
            reason: reason.into(),
        }
    }

    /// Create an issue with an explicit severity
    pub fn with_severity(requirement: Requirement, severity: Severity, reason: impl Into<String>) -> Self {
        VerificationIssue {
            requirement,
            severity,
            reason: reason.into(),
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Independently checkable facet of conformance.
///
/// Variants order by their priority rank; subsystems registered beyond
/// the fixed five sort last, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Core,
    Tiles,
    Extensions,
    Schema,
    Metadata,
    Other(String),
}

impl Subsystem {
    /// The fixed subsystems, in report order
    pub const FIXED: [Subsystem; 5] = [
        Subsystem::Core,
        Subsystem::Tiles,
        Subsystem::Extensions,
        Subsystem::Schema,
        Subsystem::Metadata,
    ];

    /// Position in report order
    pub fn rank(&self) -> u8 {
        match self {
            Subsystem::Core => 0,
            Subsystem::Tiles => 1,
            Subsystem::Extensions => 2,
            Subsystem::Schema => 3,
            Subsystem::Metadata => 4,
            Subsystem::Other(_) => 5,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Subsystem::Core => "Core",
            Subsystem::Tiles => "Tiles",
            Subsystem::Extensions => "Extensions",
            Subsystem::Schema => "Schema",
            Subsystem::Metadata => "Metadata",
            Subsystem::Other(name) => name,
        }
    }

    /// Map a name to a subsystem, falling back to `Other`
    pub fn from_name(name: &str) -> Self {
        name.parse()
            .unwrap_or_else(|_| Subsystem::Other(name.to_string()))
    }
}

impl Ord for Subsystem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.name().cmp(other.name()))
    }
}

impl PartialOrd for Subsystem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    /// Parses one of the fixed subsystems (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "core" => Ok(Subsystem::Core),
            "tiles" => Ok(Subsystem::Tiles),
            "extensions" => Ok(Subsystem::Extensions),
            "schema" => Ok(Subsystem::Schema),
            "metadata" => Ok(Subsystem::Metadata),
            _ => Err(format!(
                "Unknown subsystem: '{}'. Valid subsystems: core, tiles, extensions, schema, metadata",
                s
            )),
        }
    }
}

impl Serialize for Subsystem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Subsystem {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// File-level errors. Any of these aborts the verification of a file.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// Path is empty, missing, a directory, or unreadable
    #[error("invalid input '{}': {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },
    /// File could not be opened as a GeoPackage at all
    #[error("cannot open '{}' as a GeoPackage: {message}", .path.display())]
    EngineOpen { path: PathBuf, message: String },
    /// The coordinating thread stopped without delivering a result
    #[error("verification of '{}' stopped before completing", .path.display())]
    Interrupted { path: PathBuf },
    /// Configuration file could not be read or parsed
    #[error("configuration error in '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },
    #[error("I/O error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Subsystem-level errors. These never abort a run; the failing
/// subsystem is recorded as an engine failure instead.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("subsystem unavailable: {0}")]
    Unavailable(String),
    /// The file could not be read while checking it
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for verification runs.
///
/// Loaded from a TOML file and then overridden by command line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Depth of the requirement checks
    pub level: VerificationLevel,
    /// Subsystems to verify (None = all)
    pub subsystems: Option<Vec<Subsystem>>,
    /// Output format
    pub format: OutputFormat,
    /// Lowest severity that produces a failing exit code
    pub fail_on: FailOn,
    /// Write output to this file instead of stdout
    pub output: Option<PathBuf>,
    /// Files verified at the same time (None = `default_jobs()`)
    pub jobs: Option<usize>,
    /// Colorize terminal summaries
    pub color: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            level: VerificationLevel::Full,
            subsystems: None,
            format: OutputFormat::Text,
            fail_on: FailOn::Error,
            output: None,
            jobs: None,
            color: true,
        }
    }
}

impl VerifierConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, VerifierError> {
        let content = std::fs::read_to_string(path).map_err(|e| VerifierError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(path, &content)
    }

    fn from_toml(path: &Path, content: &str) -> Result<Self, VerifierError> {
        toml::from_str(content).map_err(|e| VerifierError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Create configuration from command line arguments.
    ///
    /// The file named by `--config` (or `GPKG_VERIFIER_CONFIG`) is the
    /// base; flags given on the command line take precedence.
    pub fn from_args(args: &VerifyArgs) -> Result<Self, VerifierError> {
        let config_path = args
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let mut config = match config_path {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        if let Some(level) = args.level {
            config.level = level;
        }
        if !args.subsystems.is_empty() {
            config.subsystems = Some(args.subsystems.clone());
        }
        if let Some(format) = args.format {
            config.format = format;
        }
        if let Some(fail_on) = args.fail_on {
            config.fail_on = fail_on;
        }
        if let Some(ref output) = args.output {
            config.output = Some(output.clone());
        }
        if let Some(jobs) = args.jobs {
            config.jobs = Some(jobs);
        }
        if args.no_color || std::env::var_os("NO_COLOR").is_some() {
            config.color = false;
        }

        Ok(config)
    }

    /// Subsystems selected by this configuration, in report order
    pub fn selected_subsystems(&self) -> Vec<Subsystem> {
        let mut selected = match self.subsystems {
            Some(ref subsystems) if !subsystems.is_empty() => subsystems.clone(),
            _ => Subsystem::FIXED.to_vec(),
        };
        selected.sort();
        selected.dedup();
        selected
    }

    /// Number of files verified at the same time, at least one
    pub fn max_files_in_flight(&self) -> usize {
        self.jobs.unwrap_or_else(default_jobs).max(1)
    }
}

/// Upper bound on the default number of files in flight.
///
/// Each file in flight holds a primary connection plus one reader per
/// subsystem.
pub const MAX_DEFAULT_JOBS: usize = 4;

/// Default number of files verified at the same time
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_JOBS)
}

/// Build an orchestrator over the SQLite-backed engine with the
/// subsystems selected by `config`.
pub fn build_orchestrator(config: &VerifierConfig) -> VerificationOrchestrator<GeoPackageEngine> {
    let orch_config = OrchestratorConfig {
        level: config.level,
    };

    let mut orchestrator = VerificationOrchestrator::new(GeoPackageEngine, orch_config);
    let selected = config.selected_subsystems();
    orchestrator.register_tasks(
        engine::orchestrator::create_default_tasks()
            .into_iter()
            .filter(|task| selected.contains(&task.subsystem))
            .collect(),
    );
    orchestrator
}

/// Verify a single GeoPackage file.
///
/// Blocks until every selected subsystem has finished.
pub fn verify_file(path: &Path, config: &VerifierConfig) -> Result<VerificationRun, VerifierError> {
    build_orchestrator(config).run_all(path)
}

/// Verify several files concurrently.
///
/// At most `config.max_files_in_flight()` files are open at once; the
/// oldest pending file is waited on before the next one is spawned.
/// Results are returned in the order of `paths`.
pub fn verify_files(
    paths: &[PathBuf],
    config: &VerifierConfig,
) -> Vec<(PathBuf, Result<VerificationRun, VerifierError>)> {
    let orchestrator = Arc::new(build_orchestrator(config));
    let limit = config.max_files_in_flight();
    debug!(files = paths.len(), limit, "verifying batch");

    let mut pending: VecDeque<VerificationHandle> = VecDeque::with_capacity(limit);
    let mut results = Vec::with_capacity(paths.len());

    for path in paths {
        if pending.len() >= limit {
            if let Some(handle) = pending.pop_front() {
                results.push(finish(handle));
            }
        }
        pending.push_back(orchestrator.spawn(path.clone()));
    }
    results.extend(pending.into_iter().map(finish));

    results
}

fn finish(handle: VerificationHandle) -> (PathBuf, Result<VerificationRun, VerifierError>) {
    let file = handle.file().to_path_buf();
    (file, handle.wait())
}
