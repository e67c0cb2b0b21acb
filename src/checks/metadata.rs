//! Metadata requirement checks over `gpkg_metadata` and
//! `gpkg_metadata_reference`.

use super::{
    column_names, describe_values, missing_columns, query_strings, run_requirement_checks,
    table_exists, timestamp_pattern, value_text, RequirementCheck,
};
use crate::geopackage::GeoPackage;
use crate::{Severity, Subsystem, VerificationError, VerificationIssue, VerificationLevel};
use rusqlite::Connection;

const METADATA_COLUMNS: [&str; 5] = ["id", "md_scope", "md_standard_uri", "mime_type", "metadata"];

const REFERENCE_COLUMNS: [&str; 7] = [
    "reference_scope",
    "table_name",
    "column_name",
    "row_id_value",
    "timestamp",
    "md_file_id",
    "md_parent_id",
];

/// Allowed `md_scope` values
pub const METADATA_SCOPES: [&str; 20] = [
    "undefined",
    "fieldSession",
    "collectionSession",
    "series",
    "dataset",
    "featureType",
    "feature",
    "attributeType",
    "attribute",
    "tile",
    "model",
    "catalogue",
    "schema",
    "taxonomy",
    "software",
    "service",
    "collectionHardware",
    "nonGeographicDataset",
    "dimensionGroup",
    "style",
];

/// Allowed `reference_scope` values
pub const REFERENCE_SCOPES: [&str; 5] = ["geopackage", "table", "column", "row", "row/col"];

/// Metadata requirement checks
pub fn checks() -> Vec<RequirementCheck> {
    vec![
        RequirementCheck::new(
            "Requirement 68",
            "A GeoPackage that contains metadata SHALL contain a gpkg_metadata table with the columns id, md_scope, md_standard_uri, mime_type, and metadata.",
            Severity::Error,
            check_metadata_table,
        ),
        RequirementCheck::new(
            "Requirement 69",
            "Each md_scope column value in a gpkg_metadata table row SHALL be one of the name column values from the metadata scopes table.",
            Severity::Error,
            check_metadata_scopes,
        ),
        RequirementCheck::new(
            "Requirement 70",
            "A GeoPackage that contains a gpkg_metadata table SHALL contain a gpkg_metadata_reference table with the columns reference_scope, table_name, column_name, row_id_value, timestamp, md_file_id, and md_parent_id.",
            Severity::Error,
            check_reference_table,
        ),
        RequirementCheck::new(
            "Requirement 71",
            "Every gpkg_metadata_reference table row reference_scope column value SHALL be one of \"geopackage\", \"table\", \"column\", \"row\", or \"row/col\" in lowercase.",
            Severity::Error,
            check_reference_scopes,
        ),
        RequirementCheck::new(
            "Requirement 72",
            "Every gpkg_metadata_reference table row with a reference_scope of \"geopackage\" SHALL have a table_name value of NULL. Every other row SHALL have a table_name value found in gpkg_contents.",
            Severity::Error,
            check_reference_table_names,
        ),
        RequirementCheck::new(
            "Requirement 73",
            "Every gpkg_metadata_reference row with a reference_scope of \"column\" or \"row/col\" SHALL have a column_name naming a column of table_name. Every other row SHALL have a column_name of NULL.",
            Severity::Error,
            check_reference_column_names,
        ),
        RequirementCheck::new(
            "Requirement 74",
            "Every gpkg_metadata_reference table row timestamp column value SHALL be in ISO 8601 format in Coordinated Universal Time.",
            Severity::Error,
            check_reference_timestamps,
        ),
        RequirementCheck::new(
            "Requirement 75",
            "Every gpkg_metadata_reference table row md_file_id column value SHALL be an id column value from the gpkg_metadata table.",
            Severity::Error,
            check_reference_file_ids,
        ),
        RequirementCheck::new(
            "Requirement 76",
            "Every gpkg_metadata_reference table row md_parent_id column value that is not NULL SHALL be an id column value from the gpkg_metadata table that is not equal to the md_file_id column value for that row.",
            Severity::Error,
            check_reference_parent_ids,
        ),
    ]
}

/// Verify the Metadata subsystem
pub fn verify(
    gpkg: &GeoPackage,
    level: VerificationLevel,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    if level == VerificationLevel::None {
        return Ok(Vec::new());
    }

    let conn = gpkg.reader()?;
    if !table_exists(&conn, "gpkg_metadata")? && !table_exists(&conn, "gpkg_metadata_reference")? {
        return Ok(Vec::new());
    }

    run_requirement_checks(&Subsystem::Metadata, &checks(), &conn, gpkg)
}

fn violation(problems: Vec<String>, what: &str) -> Option<String> {
    if problems.is_empty() {
        None
    } else {
        Some(format!("{}: {}", what, describe_values(&problems)))
    }
}

fn has_metadata(conn: &Connection) -> Result<bool, VerificationError> {
    table_exists(conn, "gpkg_metadata")
}

fn has_references(conn: &Connection) -> Result<bool, VerificationError> {
    table_exists(conn, "gpkg_metadata_reference")
}

/// One row of gpkg_metadata_reference
struct ReferenceRow {
    rowid: i64,
    scope: String,
    table_name: Option<String>,
    column_name: Option<String>,
    timestamp: String,
}

impl ReferenceRow {
    fn label(&self) -> String {
        format!("row {} ({})", self.rowid, self.scope)
    }
}

fn reference_rows(conn: &Connection) -> Result<Vec<ReferenceRow>, VerificationError> {
    let mut stmt = conn.prepare(
        "SELECT rowid, reference_scope, table_name, column_name, timestamp \
         FROM gpkg_metadata_reference ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ReferenceRow {
                rowid: row.get(0)?,
                scope: value_text(row.get_ref(1)?),
                table_name: row.get::<_, Option<String>>(2)?,
                column_name: row.get::<_, Option<String>>(3)?,
                timestamp: value_text(row.get_ref(4)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_metadata_table(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_metadata(conn)? {
        return Ok(Some(
            "gpkg_metadata_reference is present but the gpkg_metadata table is missing.".to_string(),
        ));
    }
    let missing = missing_columns(conn, "gpkg_metadata", &METADATA_COLUMNS)?;
    Ok(violation(missing, "gpkg_metadata is missing columns"))
}

fn check_metadata_scopes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_metadata(conn)? {
        return Ok(None);
    }
    let mut stmt = conn.prepare("SELECT id, md_scope FROM gpkg_metadata ORDER BY id")?;
    let invalid = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, value_text(row.get_ref(1)?)))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(_, scope)| !METADATA_SCOPES.contains(&scope.as_str()))
        .map(|(id, scope)| format!("id {} ({})", id, scope))
        .collect();
    Ok(violation(invalid, "Invalid md_scope values"))
}

fn check_reference_table(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? {
        return Ok(Some(
            "gpkg_metadata is present but the gpkg_metadata_reference table is missing.".to_string(),
        ));
    }
    let missing = missing_columns(conn, "gpkg_metadata_reference", &REFERENCE_COLUMNS)?;
    Ok(violation(missing, "gpkg_metadata_reference is missing columns"))
}

fn check_reference_scopes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? {
        return Ok(None);
    }
    let invalid = reference_rows(conn)?
        .into_iter()
        .filter(|row| !REFERENCE_SCOPES.contains(&row.scope.as_str()))
        .map(|row| row.label())
        .collect();
    Ok(violation(invalid, "Invalid reference_scope values"))
}

fn check_reference_table_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? {
        return Ok(None);
    }
    let contents = if table_exists(conn, "gpkg_contents")? {
        query_strings(conn, "SELECT table_name FROM gpkg_contents")?
    } else {
        Vec::new()
    };

    let mut problems = Vec::new();
    for row in reference_rows(conn)? {
        match (row.scope.as_str(), &row.table_name) {
            ("geopackage", Some(table)) => {
                problems.push(format!("{} names table {}", row.label(), table));
            }
            ("geopackage", None) => {}
            (_, None) => problems.push(format!("{} has no table_name", row.label())),
            (_, Some(table)) if !contents.contains(table) => {
                problems.push(format!("{} names unregistered table {}", row.label(), table));
            }
            _ => {}
        }
    }
    Ok(violation(problems, "Invalid metadata reference table names"))
}

fn check_reference_column_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? {
        return Ok(None);
    }

    let mut problems = Vec::new();
    for row in reference_rows(conn)? {
        let wants_column = matches!(row.scope.as_str(), "column" | "row/col");
        match (&row.column_name, wants_column) {
            (Some(column), false) => {
                problems.push(format!("{} names column {}", row.label(), column));
            }
            (None, true) => problems.push(format!("{} has no column_name", row.label())),
            (Some(column), true) => {
                // Requirement 72 reports missing tables
                let Some(table) = &row.table_name else {
                    continue;
                };
                if !table_exists(conn, table)? {
                    continue;
                }
                if !column_names(conn, table)?.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                    problems.push(format!("{} names missing column {}.{}", row.label(), table, column));
                }
            }
            (None, false) => {}
        }
    }
    Ok(violation(problems, "Invalid metadata reference column names"))
}

fn check_reference_timestamps(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? {
        return Ok(None);
    }
    let invalid = reference_rows(conn)?
        .into_iter()
        .filter(|row| !timestamp_pattern().is_match(&row.timestamp))
        .map(|row| format!("{}: {}", row.label(), row.timestamp))
        .collect();
    Ok(violation(invalid, "Invalid timestamp values"))
}

fn check_reference_file_ids(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? || !has_metadata(conn)? {
        return Ok(None);
    }
    let dangling = query_strings(
        conn,
        "SELECT 'row ' || rowid || ' (md_file_id ' || md_file_id || ')' FROM gpkg_metadata_reference \
         WHERE md_file_id NOT IN (SELECT id FROM gpkg_metadata) ORDER BY rowid",
    )?;
    Ok(violation(dangling, "References to undefined metadata"))
}

fn check_reference_parent_ids(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !has_references(conn)? || !has_metadata(conn)? {
        return Ok(None);
    }
    let invalid = query_strings(
        conn,
        "SELECT 'row ' || rowid || ' (md_parent_id ' || md_parent_id || ')' FROM gpkg_metadata_reference \
         WHERE md_parent_id IS NOT NULL \
         AND (md_parent_id = md_file_id OR md_parent_id NOT IN (SELECT id FROM gpkg_metadata)) \
         ORDER BY rowid",
    )?;
    Ok(violation(invalid, "Invalid md_parent_id values"))
}
