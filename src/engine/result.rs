//! Result aggregation.
//!
//! Collects per-subsystem outcomes into a `ResultSet` and the final
//! `VerificationRun` for one file.

use crate::engine::report::{render, ReportHeader};
use crate::{Severity, Subsystem, VerificationIssue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of one subsystem worker
#[derive(Debug, Clone, PartialEq)]
pub enum SubsystemOutcome {
    /// Subsystem ran and found nothing
    Passed,
    /// Subsystem ran and found at least one issue
    Issues(Vec<VerificationIssue>),
    /// Subsystem check itself failed (error or panic)
    EngineFailure(String),
}

impl SubsystemOutcome {
    /// Classify the issues returned by a subsystem
    pub fn from_issues(issues: Vec<VerificationIssue>) -> Self {
        if issues.is_empty() {
            SubsystemOutcome::Passed
        } else {
            SubsystemOutcome::Issues(issues)
        }
    }
}

/// Issues keyed by subsystem.
///
/// A subsystem is present only if it produced at least one issue. Issues
/// are kept sorted by requirement reference (stable for equal
/// references), and iteration follows subsystem priority order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    entries: BTreeMap<Subsystem, Vec<VerificationIssue>>,
}

impl ResultSet {
    pub fn new() -> Self {
        ResultSet {
            entries: BTreeMap::new(),
        }
    }

    /// Add issues for a subsystem. Empty collections are ignored.
    ///
    /// Returns true if the subsystem is present afterwards.
    pub fn insert(&mut self, subsystem: Subsystem, issues: Vec<VerificationIssue>) -> bool {
        if issues.is_empty() {
            return self.entries.contains_key(&subsystem);
        }

        let entry = self.entries.entry(subsystem).or_default();
        entry.extend(issues);
        entry.sort_by(|a, b| a.requirement().reference.cmp(&b.requirement().reference));
        true
    }

    pub fn get(&self, subsystem: &Subsystem) -> Option<&[VerificationIssue]> {
        self.entries.get(subsystem).map(Vec::as_slice)
    }

    pub fn contains(&self, subsystem: &Subsystem) -> bool {
        self.entries.contains_key(subsystem)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subsystems with issues
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Subsystems with issues, in priority order
    pub fn iter(&self) -> impl Iterator<Item = (&Subsystem, &[VerificationIssue])> {
        self.entries.iter().map(|(s, issues)| (s, issues.as_slice()))
    }

    pub fn subsystems(&self) -> Vec<&Subsystem> {
        self.entries.keys().collect()
    }

    /// Total number of issues over all subsystems
    pub fn issue_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.entries
            .values()
            .flatten()
            .filter(|issue| issue.severity() == severity)
            .count()
    }

    /// Highest severity present, if any
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries
            .values()
            .flatten()
            .map(VerificationIssue::severity)
            .max()
    }
}

/// Result summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub errors: usize,
    pub warnings: usize,
    pub subsystems_with_issues: usize,
    pub subsystems_passed: usize,
    pub subsystems_failed: usize,
}

/// Final aggregate of one file's verification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRun {
    pub file: PathBuf,
    pub results: ResultSet,
    /// Subsystems whose checks could not complete, with the cause
    pub failures: BTreeMap<Subsystem, String>,
    /// Subsystems that ran and found nothing
    pub passed: Vec<Subsystem>,
    pub duration_ms: u64,
}

impl VerificationRun {
    /// Merge worker outcomes after the join barrier
    pub fn from_outcomes(
        file: &Path,
        outcomes: Vec<(Subsystem, SubsystemOutcome)>,
        duration_ms: u64,
    ) -> Self {
        let mut results = ResultSet::new();
        let mut failures = BTreeMap::new();
        let mut passed = Vec::new();

        for (subsystem, outcome) in outcomes {
            match outcome {
                SubsystemOutcome::Passed => passed.push(subsystem),
                SubsystemOutcome::Issues(issues) => {
                    results.insert(subsystem, issues);
                }
                SubsystemOutcome::EngineFailure(cause) => {
                    failures.insert(subsystem, cause);
                }
            }
        }
        passed.sort();

        VerificationRun {
            file: file.to_path_buf(),
            results,
            failures,
            passed,
            duration_ms,
        }
    }

    /// True if any subsystem reported an issue
    pub fn has_issues(&self) -> bool {
        !self.results.is_empty()
    }

    /// True if any subsystem check failed to run
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            errors: self.results.count_severity(Severity::Error),
            warnings: self.results.count_severity(Severity::Warning),
            subsystems_with_issues: self.results.len(),
            subsystems_passed: self.passed.len(),
            subsystems_failed: self.failures.len(),
        }
    }

    /// File name as shown in the report header
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }

    pub fn header(&self) -> ReportHeader {
        ReportHeader::for_file(&self.file)
    }

    /// Plain-text issue report
    pub fn report(&self) -> String {
        render(&self.header(), &self.results)
    }
}
