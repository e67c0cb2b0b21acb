//! Requirement checks, one module per subsystem.
//!
//! - Core: file format, application id, mandatory tables
//! - Tiles: tile matrix set, tile matrix, tile pyramid tables
//! - Extensions: gpkg_extensions registrations
//! - Schema: gpkg_data_columns and their constraints
//! - Metadata: gpkg_metadata and gpkg_metadata_reference
//!
//! # Graceful Degradation
//!
//! - Optional table absent: the subsystem reports nothing
//! - Query error inside one check: reported as an issue against that
//!   requirement, the remaining checks still run
//! - File unreadable during a check: the whole subsystem returns `Err`
//! - No reader connection: the whole subsystem returns `Err`, which the
//!   orchestrator records as an engine failure
//!
//! Checks never panic.

pub mod core;
pub mod extensions;
pub mod metadata;
pub mod schema;
pub mod tiles;

use crate::geopackage::GeoPackage;
use crate::{Requirement, Severity, Subsystem, VerificationError, VerificationIssue};
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::OnceLock;
use tracing::debug;

/// Evaluates one requirement. `Ok(None)` means the requirement holds;
/// `Ok(Some(reason))` describes the violation.
pub type CheckFn = fn(&Connection, &GeoPackage) -> Result<Option<String>, VerificationError>;

/// A requirement with its check function
pub struct RequirementCheck {
    pub requirement: Requirement,
    pub check_fn: CheckFn,
}

impl RequirementCheck {
    pub fn new(reference: &str, text: &str, severity: Severity, check_fn: CheckFn) -> Self {
        RequirementCheck {
            requirement: Requirement::new(reference, text, severity),
            check_fn,
        }
    }
}

/// Evaluate every check and collect the violations.
///
/// An I/O error means the file itself could not be read, so it aborts
/// the subsystem instead of being reported against a requirement.
pub fn run_requirement_checks(
    subsystem: &Subsystem,
    checks: &[RequirementCheck],
    conn: &Connection,
    gpkg: &GeoPackage,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    let mut issues = Vec::new();

    for check in checks {
        match (check.check_fn)(conn, gpkg) {
            Ok(None) => {}
            Ok(Some(reason)) => {
                issues.push(VerificationIssue::new(check.requirement.clone(), reason));
            }
            Err(e @ VerificationError::Io(_)) => return Err(e),
            Err(e) => {
                debug!(
                    subsystem = %subsystem,
                    requirement = %check.requirement.reference,
                    error = %e,
                    "requirement could not be evaluated"
                );
                issues.push(VerificationIssue::new(
                    check.requirement.clone(),
                    format!("Unable to evaluate requirement: {}", e),
                ));
            }
        }
    }

    debug!(
        subsystem = %subsystem,
        checked = checks.len(),
        issues = issues.len(),
        "requirement checks complete"
    );
    Ok(issues)
}

/// Requirement catalogue of a subsystem
pub fn requirements(subsystem: &Subsystem) -> Vec<Requirement> {
    let checks = match subsystem {
        Subsystem::Core => core::checks(),
        Subsystem::Tiles => tiles::checks(),
        Subsystem::Extensions => extensions::checks(),
        Subsystem::Schema => schema::checks(),
        Subsystem::Metadata => metadata::checks(),
        Subsystem::Other(_) => Vec::new(),
    };
    checks.into_iter().map(|c| c.requirement).collect()
}

/// True if a table or view named `name` exists
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, VerificationError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type IN ('table', 'view') AND tbl_name = ?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of `table`, in declaration order
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>, VerificationError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Expected columns that `table` lacks (case-insensitive)
pub fn missing_columns(
    conn: &Connection,
    table: &str,
    expected: &[&str],
) -> Result<Vec<String>, VerificationError> {
    let present: Vec<String> = column_names(conn, table)?
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();
    Ok(expected
        .iter()
        .filter(|column| !present.contains(&column.to_lowercase()))
        .map(|column| column.to_string())
        .collect())
}

/// First column of every row of `sql`, read as text
pub fn query_strings(conn: &Connection, sql: &str) -> Result<Vec<String>, VerificationError> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map([], |row| Ok(value_text(row.get_ref(0)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

/// Render any SQLite value as text
pub fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} byte blob>", b.len()),
    }
}

/// Number of rows matched by a `SELECT count(*)` query
pub fn query_count(conn: &Connection, sql: &str) -> Result<i64, VerificationError> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

/// Quote an SQL identifier
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma-separated list, truncated after ten entries
pub fn describe_values(values: &[String]) -> String {
    const LIMIT: usize = 10;
    if values.len() <= LIMIT {
        values.join(", ")
    } else {
        format!(
            "{}, and {} more",
            values[..LIMIT].join(", "),
            values.len() - LIMIT
        )
    }
}

/// Pattern of an ISO 8601 UTC timestamp as GeoPackage stores them
pub fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2}(\.\d{1,3})?)?Z$")
            .expect("timestamp pattern is valid")
    })
}
