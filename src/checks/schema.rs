//! Schema requirement checks over `gpkg_data_columns` and
//! `gpkg_data_column_constraints`.

use super::{
    column_names, describe_values, missing_columns, query_strings, run_requirement_checks,
    table_exists, RequirementCheck,
};
use crate::geopackage::GeoPackage;
use crate::{Severity, Subsystem, VerificationError, VerificationIssue, VerificationLevel};
use rusqlite::Connection;

const CONSTRAINT_COLUMNS: [&str; 8] = [
    "constraint_name",
    "constraint_type",
    "value",
    "min",
    "minIsInclusive",
    "max",
    "maxIsInclusive",
    "description",
];

/// Schema requirement checks
pub fn checks() -> Vec<RequirementCheck> {
    vec![
        RequirementCheck::new(
            "Requirement 57",
            "Values of the gpkg_data_columns table_name column SHALL reference values in the gpkg_contents table_name column.",
            Severity::Error,
            check_data_column_tables,
        ),
        RequirementCheck::new(
            "Requirement 58",
            "The column_name column value in a gpkg_data_columns table row SHALL contain the name of a column in the table referenced by table_name.",
            Severity::Error,
            check_data_column_columns,
        ),
        RequirementCheck::new(
            "Requirement 59",
            "The constraint_name column value in a gpkg_data_columns table row SHALL be NULL or reference a constraint_name in gpkg_data_column_constraints.",
            Severity::Error,
            check_constraint_references,
        ),
        RequirementCheck::new(
            "Requirement 60",
            "A GeoPackage whose gpkg_data_columns rows name constraints SHALL contain a gpkg_data_column_constraints table.",
            Severity::Error,
            check_constraints_table_exists,
        ),
        RequirementCheck::new(
            "Requirement 61",
            "The gpkg_data_column_constraints table SHALL have the columns constraint_name, constraint_type, value, min, minIsInclusive, max, maxIsInclusive, and description.",
            Severity::Error,
            check_constraints_columns,
        ),
        RequirementCheck::new(
            "Requirement 62",
            "The constraint_type column value in a gpkg_data_column_constraints row SHALL be one of \"range\", \"enum\", or \"glob\".",
            Severity::Error,
            check_constraint_types,
        ),
        RequirementCheck::new(
            "Requirement 63",
            "For range constraints the min value SHALL be less than the max value, and the value column SHALL be NULL.",
            Severity::Error,
            check_range_constraints,
        ),
        RequirementCheck::new(
            "Requirement 64",
            "For enum and glob constraints the value column SHALL NOT be NULL.",
            Severity::Error,
            check_enum_constraints,
        ),
    ]
}

/// Verify the Schema subsystem
pub fn verify(
    gpkg: &GeoPackage,
    level: VerificationLevel,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    if level == VerificationLevel::None {
        return Ok(Vec::new());
    }

    let conn = gpkg.reader()?;
    if !table_exists(&conn, "gpkg_data_columns")? {
        return Ok(Vec::new());
    }

    run_requirement_checks(&Subsystem::Schema, &checks(), &conn, gpkg)
}

fn violation(problems: Vec<String>, what: &str) -> Option<String> {
    if problems.is_empty() {
        None
    } else {
        Some(format!("{}: {}", what, describe_values(&problems)))
    }
}

fn constraints_table(conn: &Connection) -> Result<bool, VerificationError> {
    table_exists(conn, "gpkg_data_column_constraints")
}

/// (table_name, column_name) pairs of gpkg_data_columns
fn data_columns(conn: &Connection) -> Result<Vec<(String, String)>, VerificationError> {
    let mut stmt = conn.prepare(
        "SELECT table_name, column_name FROM gpkg_data_columns ORDER BY table_name, column_name",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_data_column_tables(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_contents")? {
        return Ok(None);
    }
    let unregistered = query_strings(
        conn,
        "SELECT DISTINCT table_name FROM gpkg_data_columns \
         WHERE table_name NOT IN (SELECT table_name FROM gpkg_contents) ORDER BY table_name",
    )?;
    Ok(violation(unregistered, "Data columns on tables missing from gpkg_contents"))
}

fn check_data_column_columns(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let mut problems = Vec::new();
    for (table, column) in data_columns(conn)? {
        if !table_exists(conn, &table)? {
            problems.push(format!("{}.{} (no such table)", table, column));
            continue;
        }
        let columns = column_names(conn, &table)?;
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
            problems.push(format!("{}.{}", table, column));
        }
    }
    Ok(violation(problems, "Data columns that do not exist"))
}

fn check_constraints_table_exists(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if constraints_table(conn)? {
        return Ok(None);
    }
    let named = query_strings(
        conn,
        "SELECT DISTINCT constraint_name FROM gpkg_data_columns \
         WHERE constraint_name IS NOT NULL ORDER BY constraint_name",
    )?;
    Ok(violation(
        named,
        "gpkg_data_column_constraints is missing but data columns name constraints",
    ))
}

fn check_constraint_references(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    // Requirement 60 covers a missing constraints table
    if !constraints_table(conn)? {
        return Ok(None);
    }
    let dangling = query_strings(
        conn,
        "SELECT table_name || '.' || column_name || ' (' || constraint_name || ')' \
         FROM gpkg_data_columns WHERE constraint_name IS NOT NULL AND constraint_name NOT IN \
         (SELECT constraint_name FROM gpkg_data_column_constraints) ORDER BY table_name, column_name",
    )?;
    Ok(violation(dangling, "Data columns reference undefined constraints"))
}

fn check_constraints_columns(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !constraints_table(conn)? {
        return Ok(None);
    }
    let missing = missing_columns(conn, "gpkg_data_column_constraints", &CONSTRAINT_COLUMNS)?;
    Ok(violation(missing, "gpkg_data_column_constraints is missing columns"))
}

fn check_constraint_types(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    constraint_rows_where(
        conn,
        "constraint_type NOT IN ('range', 'enum', 'glob')",
        "Invalid constraint types",
    )
}

fn check_range_constraints(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    constraint_rows_where(
        conn,
        "constraint_type = 'range' AND (min IS NULL OR max IS NULL OR min >= max OR value IS NOT NULL)",
        "Invalid range constraints",
    )
}

fn check_enum_constraints(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    constraint_rows_where(
        conn,
        "constraint_type IN ('enum', 'glob') AND value IS NULL",
        "Enum or glob constraints without a value",
    )
}

fn constraint_rows_where(
    conn: &Connection,
    condition: &str,
    what: &str,
) -> Result<Option<String>, VerificationError> {
    if !constraints_table(conn)? {
        return Ok(None);
    }
    let rows = query_strings(
        conn,
        &format!(
            "SELECT constraint_name || ' (' || constraint_type || ')' FROM gpkg_data_column_constraints \
             WHERE {} ORDER BY constraint_name",
            condition
        ),
    )?;
    Ok(violation(rows, what))
}
