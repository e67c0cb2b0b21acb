//! Core requirement checks.
//!
//! File format, application id, database integrity, and the two tables
//! every GeoPackage must contain: `gpkg_spatial_ref_sys` and
//! `gpkg_contents`.

use super::{
    describe_values, query_count, query_strings, run_requirement_checks, table_exists,
    timestamp_pattern, RequirementCheck,
};
use crate::geopackage::{GeoPackage, HeaderError, SqliteHeader};
use crate::{Severity, Subsystem, VerificationError, VerificationIssue, VerificationLevel};
use rusqlite::Connection;

/// Core requirement checks
pub fn checks() -> Vec<RequirementCheck> {
    vec![
        RequirementCheck::new(
            "Requirement 1",
            "A GeoPackage SHALL be a SQLite database file using version 3 of the SQLite file format.",
            Severity::Error,
            check_sqlite_format,
        ),
        RequirementCheck::new(
            "Requirement 2",
            "A GeoPackage SHALL contain a GeoPackage value in the application id field of the SQLite database header.",
            Severity::Error,
            check_application_id,
        ),
        RequirementCheck::new(
            "Requirement 3",
            "A GeoPackage SHALL have the file extension name \".gpkg\".",
            Severity::Warning,
            check_file_extension,
        ),
        RequirementCheck::new(
            "Requirement 6",
            "The SQLite PRAGMA integrity_check SQL command SHALL return \"ok\".",
            Severity::Error,
            check_integrity,
        ),
        RequirementCheck::new(
            "Requirement 7",
            "The SQLite PRAGMA foreign_key_check SQL command with no parameter value SHALL return an empty result set.",
            Severity::Error,
            check_foreign_keys,
        ),
        RequirementCheck::new(
            "Requirement 10",
            "A GeoPackage SHALL include a gpkg_spatial_ref_sys table.",
            Severity::Error,
            check_spatial_ref_sys_exists,
        ),
        RequirementCheck::new(
            "Requirement 11",
            "The gpkg_spatial_ref_sys table SHALL contain records for srs_id 4326, -1, and 0.",
            Severity::Error,
            check_default_spatial_ref_sys,
        ),
        RequirementCheck::new(
            "Requirement 13",
            "A GeoPackage SHALL include a gpkg_contents table.",
            Severity::Error,
            check_contents_exists,
        ),
        RequirementCheck::new(
            "Requirement 14",
            "The table_name column value in a gpkg_contents table row SHALL contain the name of a SQLite table or view.",
            Severity::Error,
            check_contents_table_names,
        ),
        RequirementCheck::new(
            "Requirement 15",
            "Values of the gpkg_contents table last_change column SHALL be in ISO 8601 format in Coordinated Universal Time.",
            Severity::Error,
            check_contents_last_change,
        ),
        RequirementCheck::new(
            "Requirement 16",
            "Values of the gpkg_contents table srs_id column SHALL reference values in the gpkg_spatial_ref_sys table srs_id column.",
            Severity::Error,
            check_contents_srs_ids,
        ),
    ]
}

/// Verify the Core subsystem
pub fn verify(
    gpkg: &GeoPackage,
    level: VerificationLevel,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    if level == VerificationLevel::None {
        return Ok(Vec::new());
    }

    let conn = gpkg.reader()?;
    run_requirement_checks(&Subsystem::Core, &checks(), &conn, gpkg)
}

fn check_sqlite_format(_conn: &Connection, gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    // Re-read from disk; the handle only proves the header was valid at open time
    match SqliteHeader::read(gpkg.path()) {
        Ok(_) => Ok(None),
        Err(HeaderError::Io(e)) => Err(e.into()),
        Err(e) => Ok(Some(e.to_string())),
    }
}

fn check_application_id(_conn: &Connection, gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let header = gpkg.header();
    if header.is_geopackage() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "The application id is {} (0x{:08X}); expected GP10, GP11, or GPKG.",
            header.application_id_text(),
            header.application_id
        )))
    }
}

fn check_file_extension(_conn: &Connection, gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let extension = gpkg
        .path()
        .extension()
        .map(|e| e.to_string_lossy().into_owned());

    match extension {
        Some(ref e) if e == "gpkg" => Ok(None),
        Some(e) => Ok(Some(format!("The file extension is \".{}\".", e))),
        None => Ok(Some("The file has no extension.".to_string())),
    }
}

fn check_integrity(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let results = query_strings(conn, "PRAGMA integrity_check")?;
    if results.len() == 1 && results[0] == "ok" {
        Ok(None)
    } else {
        Ok(Some(format!(
            "PRAGMA integrity_check returned: {}",
            describe_values(&results)
        )))
    }
}

fn check_foreign_keys(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let violations = stmt
        .query_map([], |row| {
            Ok(format!(
                "{} -> {}",
                row.get::<_, String>(0)?,
                row.get::<_, String>(2)?
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if violations.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "{} foreign key violation(s): {}",
            violations.len(),
            describe_values(&violations)
        )))
    }
}

fn check_spatial_ref_sys_exists(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    missing_table(conn, "gpkg_spatial_ref_sys")
}

fn check_contents_exists(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    missing_table(conn, "gpkg_contents")
}

fn check_default_spatial_ref_sys(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_spatial_ref_sys")? {
        return Ok(Some("The gpkg_spatial_ref_sys table is missing.".to_string()));
    }

    let mut missing = Vec::new();
    for srs_id in [4326, -1, 0] {
        let count = query_count(
            conn,
            &format!("SELECT count(*) FROM gpkg_spatial_ref_sys WHERE srs_id = {}", srs_id),
        )?;
        if count == 0 {
            missing.push(srs_id.to_string());
        }
    }

    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Missing gpkg_spatial_ref_sys record(s) for srs_id {}.",
            describe_values(&missing)
        )))
    }
}

fn check_contents_table_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_contents")? {
        return Ok(None);
    }

    let mut dangling = Vec::new();
    for table in query_strings(conn, "SELECT table_name FROM gpkg_contents")? {
        if !table_exists(conn, &table)? {
            dangling.push(table);
        }
    }

    if dangling.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "gpkg_contents references tables or views that do not exist: {}",
            describe_values(&dangling)
        )))
    }
}

fn check_contents_last_change(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_contents")? {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT table_name, last_change FROM gpkg_contents")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                super::value_text(row.get_ref(0)?),
                super::value_text(row.get_ref(1)?),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let invalid: Vec<String> = rows
        .into_iter()
        .filter(|(_, last_change)| !timestamp_pattern().is_match(last_change))
        .map(|(table, last_change)| format!("{} ({})", table, last_change))
        .collect();

    if invalid.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Invalid last_change values: {}",
            describe_values(&invalid)
        )))
    }
}

fn check_contents_srs_ids(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_contents")? || !table_exists(conn, "gpkg_spatial_ref_sys")? {
        return Ok(None);
    }

    let dangling = query_strings(
        conn,
        "SELECT table_name FROM gpkg_contents \
         WHERE srs_id IS NOT NULL AND srs_id NOT IN (SELECT srs_id FROM gpkg_spatial_ref_sys)",
    )?;

    if dangling.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "gpkg_contents rows reference undefined srs_id values: {}",
            describe_values(&dangling)
        )))
    }
}

fn missing_table(conn: &Connection, table: &str) -> Result<Option<String>, VerificationError> {
    if table_exists(conn, table)? {
        Ok(None)
    } else {
        Ok(Some(format!("The {} table is missing.", table)))
    }
}
