//! Plain-text issue report.
//!
//! The layout is consumed by people pasting reports into tickets, so it
//! is kept byte-for-byte stable:
//!
//! ```text
//! <Tool> Version <v>.
//! <Spec> Version <v>.
//! File: <name>
//!
//!
//!
//! <Subsystem> Issues:
//!
//! (<severity>) <reference>: "<text>"
//!
//! <reason>
//! ```

use crate::engine::result::ResultSet;
use crate::version::{SPECIFICATION_NAME, SPECIFICATION_VERSION, TOOL_NAME};
use crate::{Subsystem, VerificationIssue};
use std::fmt;
use std::path::Path;

/// The three literal header fields of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub tool: String,
    pub tool_version: String,
    pub specification: String,
    pub specification_version: String,
    pub file_name: String,
}

impl ReportHeader {
    /// Header for `path` using this build's tool and specification versions
    pub fn for_file(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        ReportHeader {
            tool: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            specification: SPECIFICATION_NAME.to_string(),
            specification_version: SPECIFICATION_VERSION.to_string(),
            file_name,
        }
    }
}

impl fmt::Display for ReportHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Version {}.\n{} Version {}.\nFile: {}\n\n\n",
            self.tool, self.tool_version, self.specification, self.specification_version, self.file_name
        )
    }
}

/// Render the report for one file.
///
/// Sections follow subsystem priority order and issues follow the
/// `ResultSet` ordering, so equal inputs always render identically.
pub fn render(header: &ReportHeader, results: &ResultSet) -> String {
    let body = results
        .iter()
        .map(|(subsystem, issues)| render_section(subsystem, issues))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n{}", header, body)
}

fn render_section(subsystem: &Subsystem, issues: &[VerificationIssue]) -> String {
    let messages = issues
        .iter()
        .map(render_issue)
        .collect::<Vec<_>>()
        .join("\n");

    format!("{} Issues:\n\n{}", subsystem, messages)
}

fn render_issue(issue: &VerificationIssue) -> String {
    format!(
        "({}) {}: \"{}\"\n\n{}\n",
        issue.severity(),
        issue.requirement().reference,
        issue.requirement().text,
        issue.reason()
    )
}
