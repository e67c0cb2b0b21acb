//! Output formatting for gpkg-verifier.
//!
//! Provides the plain-text report, JSON, and JUnit XML formatters.
//!
//! # Graceful Degradation
//!
//! - Non-TTY output: color disabled via NO_COLOR or --no-color
//! - Non-UTF8 paths: lossy conversion
//! - Empty batches: valid output with zero files
//!
//! All formatters produce valid output for any slice of runs.
//! No function in this module will panic.

use crate::cli::args::OutputFormat;
use crate::engine::result::{ResultSummary, VerificationRun};
use crate::version::{SPECIFICATION_NAME, SPECIFICATION_VERSION, TOOL_NAME};
use crate::{Severity, Subsystem};
use serde::Serialize;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format the runs of one invocation into a string
    fn format(&self, runs: &[VerificationRun]) -> String;
}

/// Plain-text report formatter
pub struct TextFormatter {
    color: bool,
}

impl TextFormatter {
    pub fn new(color: bool) -> Self {
        TextFormatter { color }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn yellow(&self, text: &str) -> String {
        self.colorize(text, "33")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    /// One-line summary of a run, for the terminal
    pub fn summary(&self, run: &VerificationRun) -> String {
        let summary = run.summary();

        let status = if summary.subsystems_failed > 0 {
            self.red("[INCOMPLETE]")
        } else if summary.errors > 0 {
            self.red("[FAIL]")
        } else if summary.warnings > 0 {
            self.yellow("[WARN]")
        } else {
            self.green("[PASS]")
        };

        let mut line = format!(
            "{} {}: {} error{}, {} warning{} ({} ms)",
            status,
            run.file_name(),
            summary.errors,
            plural(summary.errors),
            summary.warnings,
            plural(summary.warnings),
            run.duration_ms
        );

        if summary.subsystems_failed > 0 {
            let failed: Vec<&str> = run.failures.keys().map(Subsystem::name).collect();
            line.push_str(&format!("; could not verify {}", failed.join(", ")));
        }

        line
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, runs: &[VerificationRun]) -> String {
        runs.iter()
            .map(VerificationRun::report)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    tool: &'static str,
    tool_version: &'static str,
    specification: &'static str,
    specification_version: &'static str,
    files: Vec<JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    #[serde(flatten)]
    run: &'a VerificationRun,
    has_issues: bool,
    summary: ResultSummary,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, runs: &[VerificationRun]) -> String {
        let report = JsonReport {
            tool: TOOL_NAME,
            tool_version: env!("CARGO_PKG_VERSION"),
            specification: SPECIFICATION_NAME,
            specification_version: SPECIFICATION_VERSION,
            files: runs
                .iter()
                .map(|run| JsonFile {
                    run,
                    has_issues: run.has_issues(),
                    summary: run.summary(),
                })
                .collect(),
        };

        let result = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };

        result.unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to serialize report: {}", e) }).to_string()
        })
    }
}

/// JUnit XML formatter
pub struct JunitFormatter;

impl JunitFormatter {
    pub fn new() -> Self {
        JunitFormatter
    }

    fn escape_xml(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '&' => result.push_str("&amp;"),
                '<' => result.push_str("&lt;"),
                '>' => result.push_str("&gt;"),
                '"' => result.push_str("&quot;"),
                '\'' => result.push_str("&apos;"),
                c => result.push(c),
            }
        }
        result
    }

    fn format_run(output: &mut String, run: &VerificationRun) {
        let file = Self::escape_xml(&run.file_name());

        let mut subsystems: Vec<&Subsystem> = run
            .passed
            .iter()
            .chain(run.results.subsystems())
            .chain(run.failures.keys())
            .collect();
        subsystems.sort();
        subsystems.dedup();

        for subsystem in subsystems {
            let name = Self::escape_xml(subsystem.name());
            let issues = run.results.get(subsystem).unwrap_or(&[]);
            let failure = run.failures.get(subsystem);
            let tests = issues.len().max(1);
            let errors = usize::from(failure.is_some());

            output.push_str(&format!(
                "  <testsuite name=\"{}.{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\">\n",
                file,
                name,
                tests,
                issues.len(),
                errors
            ));

            if let Some(cause) = failure {
                output.push_str(&format!(
                    "    <testcase name=\"{} verification\" classname=\"{}.{}\">\n",
                    name, file, name
                ));
                output.push_str(&format!(
                    "      <error message=\"subsystem could not be verified\">{}</error>\n",
                    Self::escape_xml(cause)
                ));
                output.push_str("    </testcase>\n");
            } else if issues.is_empty() {
                output.push_str(&format!(
                    "    <testcase name=\"{} requirements\" classname=\"{}.{}\" />\n",
                    name, file, name
                ));
            }

            for issue in issues {
                let requirement = issue.requirement();
                let kind = match issue.severity() {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                output.push_str(&format!(
                    "    <testcase name=\"{}\" classname=\"{}.{}\">\n",
                    Self::escape_xml(&requirement.reference),
                    file,
                    name
                ));
                output.push_str(&format!(
                    "      <failure message=\"{}\" type=\"{}\">{}</failure>\n",
                    Self::escape_xml(&requirement.text),
                    kind,
                    Self::escape_xml(issue.reason())
                ));
                output.push_str("    </testcase>\n");
            }

            output.push_str("  </testsuite>\n");
        }
    }
}

impl Default for JunitFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JunitFormatter {
    fn format(&self, runs: &[VerificationRun]) -> String {
        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures: usize = runs.iter().map(|run| run.results.issue_count()).sum();
        let errors: usize = runs.iter().map(|run| run.failures.len()).sum();
        let total_ms: u64 = runs.iter().map(|run| run.duration_ms).sum();

        output.push_str(&format!(
            "<testsuites name=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">\n",
            TOOL_NAME,
            failures,
            errors,
            total_ms as f64 / 1000.0
        ));

        for run in runs {
            Self::format_run(&mut output, run);
        }

        output.push_str("</testsuites>");
        output
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(format: OutputFormat, color: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(color)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Junit => Box::new(JunitFormatter::new()),
    }
}
