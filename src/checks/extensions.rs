//! Extensions requirement checks over `gpkg_extensions`.

use super::{
    column_names, describe_values, missing_columns, run_requirement_checks, table_exists, value_text,
    RequirementCheck,
};
use crate::geopackage::GeoPackage;
use crate::{Severity, Subsystem, VerificationError, VerificationIssue, VerificationLevel};
use regex::Regex;
use rusqlite::Connection;
use std::sync::OnceLock;

const EXTENSION_COLUMNS: [&str; 5] = ["table_name", "column_name", "extension_name", "definition", "scope"];

const SCOPES: [&str; 2] = ["read-write", "write-only"];

/// Extensions requirement checks
pub fn checks() -> Vec<RequirementCheck> {
    vec![
        RequirementCheck::new(
            "Requirement 79",
            "A GeoPackage that contains a gpkg_extensions table SHALL have the columns table_name, column_name, extension_name, definition, and scope.",
            Severity::Error,
            check_extension_columns,
        ),
        RequirementCheck::new(
            "Requirement 80",
            "Values of the gpkg_extensions table_name column SHALL reference existing tables or be NULL, and SHALL NOT be NULL when column_name is not NULL.",
            Severity::Error,
            check_extension_table_names,
        ),
        RequirementCheck::new(
            "Requirement 81",
            "The column_name column value in a gpkg_extensions row SHALL be the name of a column in the table specified by table_name, or NULL.",
            Severity::Error,
            check_extension_column_names,
        ),
        RequirementCheck::new(
            "Requirement 82",
            "Each extension_name column value in a gpkg_extensions row SHALL be of the form <author>_<extension_name>.",
            Severity::Error,
            check_extension_names,
        ),
        RequirementCheck::new(
            "Requirement 84",
            "The scope column value in a gpkg_extensions row SHALL be lowercase \"read-write\" or \"write-only\".",
            Severity::Error,
            check_extension_scopes,
        ),
    ]
}

/// Verify the Extensions subsystem
pub fn verify(
    gpkg: &GeoPackage,
    level: VerificationLevel,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    if level == VerificationLevel::None {
        return Ok(Vec::new());
    }

    let conn = gpkg.reader()?;
    if !table_exists(&conn, "gpkg_extensions")? {
        return Ok(Vec::new());
    }

    run_requirement_checks(&Subsystem::Extensions, &checks(), &conn, gpkg)
}

fn extension_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]+_[a-zA-Z0-9_]+$").expect("extension name pattern is valid")
    })
}

/// One row of gpkg_extensions
struct ExtensionRow {
    table_name: Option<String>,
    column_name: Option<String>,
    extension_name: String,
    scope: String,
}

impl ExtensionRow {
    fn label(&self) -> String {
        match (&self.table_name, &self.column_name) {
            (Some(table), Some(column)) => format!("{} on {}.{}", self.extension_name, table, column),
            (Some(table), None) => format!("{} on {}", self.extension_name, table),
            (None, Some(column)) => format!("{} on column {}", self.extension_name, column),
            (None, None) => self.extension_name.clone(),
        }
    }
}

fn extension_rows(conn: &Connection) -> Result<Vec<ExtensionRow>, VerificationError> {
    let mut stmt = conn.prepare(
        "SELECT table_name, column_name, extension_name, scope FROM gpkg_extensions \
         ORDER BY extension_name, table_name, column_name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ExtensionRow {
                table_name: row.get::<_, Option<String>>(0)?,
                column_name: row.get::<_, Option<String>>(1)?,
                extension_name: value_text(row.get_ref(2)?),
                scope: value_text(row.get_ref(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn violation(problems: Vec<String>, what: &str) -> Option<String> {
    if problems.is_empty() {
        None
    } else {
        Some(format!("{}: {}", what, describe_values(&problems)))
    }
}

fn check_extension_columns(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let missing = missing_columns(conn, "gpkg_extensions", &EXTENSION_COLUMNS)?;
    Ok(violation(missing, "gpkg_extensions is missing columns"))
}

fn check_extension_table_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let mut problems = Vec::new();
    for row in extension_rows(conn)? {
        match &row.table_name {
            Some(table) => {
                if !table_exists(conn, table)? {
                    problems.push(format!("{} (no such table)", row.label()));
                }
            }
            None if row.column_name.is_some() => {
                problems.push(format!("{} (column without table)", row.label()));
            }
            None => {}
        }
    }
    Ok(violation(problems, "Invalid extension table references"))
}

fn check_extension_column_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let mut problems = Vec::new();
    for row in extension_rows(conn)? {
        let (Some(table), Some(column)) = (&row.table_name, &row.column_name) else {
            continue;
        };
        // Requirement 80 reports missing tables
        if !table_exists(conn, table)? {
            continue;
        }
        let columns = column_names(conn, table)?;
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            problems.push(row.label());
        }
    }
    Ok(violation(problems, "Extensions registered on columns that do not exist"))
}

fn check_extension_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let invalid: Vec<String> = extension_rows(conn)?
        .into_iter()
        .filter(|row| !extension_name_pattern().is_match(&row.extension_name))
        .map(|row| row.extension_name)
        .collect();
    Ok(violation(invalid, "Malformed extension names"))
}

fn check_extension_scopes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let invalid: Vec<String> = extension_rows(conn)?
        .into_iter()
        .filter(|row| !SCOPES.contains(&row.scope.as_str()))
        .map(|row| format!("{} ({})", row.label(), row.scope))
        .collect();
    Ok(violation(invalid, "Invalid extension scopes"))
}
