//! Tiles requirement checks.
//!
//! Only run when the file declares `tiles` content or carries a
//! `gpkg_tile_matrix_set` table.

use super::{
    describe_values, missing_columns, query_count, query_strings, quote_identifier, quote_literal,
    run_requirement_checks, table_exists, RequirementCheck,
};
use crate::geopackage::GeoPackage;
use crate::{Severity, Subsystem, VerificationError, VerificationIssue, VerificationLevel};
use rusqlite::Connection;

const TILE_COLUMNS: [&str; 5] = ["id", "zoom_level", "tile_column", "tile_row", "tile_data"];

/// Tiles requirement checks
pub fn checks() -> Vec<RequirementCheck> {
    vec![
        RequirementCheck::new(
            "Requirement 33",
            "Each tile pyramid user data table SHALL have the columns id, zoom_level, tile_column, tile_row, and tile_data.",
            Severity::Error,
            check_tile_table_columns,
        ),
        RequirementCheck::new(
            "Requirement 37",
            "A GeoPackage that contains a tile pyramid user data table SHALL contain a gpkg_tile_matrix_set table.",
            Severity::Error,
            check_tile_matrix_set_exists,
        ),
        RequirementCheck::new(
            "Requirement 38",
            "Values of the gpkg_tile_matrix_set table_name column SHALL reference values in the gpkg_contents table_name column for rows with a data type of \"tiles\".",
            Severity::Error,
            check_tile_matrix_set_table_names,
        ),
        RequirementCheck::new(
            "Requirement 39",
            "Values of the gpkg_tile_matrix_set srs_id column SHALL reference values in the gpkg_spatial_ref_sys srs_id column.",
            Severity::Error,
            check_tile_matrix_set_srs_ids,
        ),
        RequirementCheck::new(
            "Requirement 41",
            "A GeoPackage that contains a tile pyramid user data table SHALL contain a gpkg_tile_matrix table.",
            Severity::Error,
            check_tile_matrix_exists,
        ),
        RequirementCheck::new(
            "Requirement 42",
            "Values of the gpkg_tile_matrix table_name column SHALL reference values in the gpkg_contents table_name column for rows with a data type of \"tiles\".",
            Severity::Error,
            check_tile_matrix_table_names,
        ),
        RequirementCheck::new(
            "Requirement 44",
            "The zoom_level column value in a gpkg_tile_matrix table row SHALL not be negative.",
            Severity::Error,
            check_zoom_levels,
        ),
        RequirementCheck::new(
            "Requirement 45",
            "The matrix_width and matrix_height column values in a gpkg_tile_matrix table row SHALL be greater than 0.",
            Severity::Error,
            check_matrix_sizes,
        ),
        RequirementCheck::new(
            "Requirement 47",
            "The tile_width and tile_height column values in a gpkg_tile_matrix table row SHALL be greater than 0.",
            Severity::Error,
            check_tile_sizes,
        ),
        RequirementCheck::new(
            "Requirement 49",
            "The pixel_x_size and pixel_y_size column values in a gpkg_tile_matrix table row SHALL be greater than 0.",
            Severity::Error,
            check_pixel_sizes,
        ),
        RequirementCheck::new(
            "Requirement 54",
            "The zoom_level column value in a tile pyramid user data table row SHALL be a zoom_level defined for that table in gpkg_tile_matrix.",
            Severity::Error,
            check_tile_zoom_levels_defined,
        ),
        RequirementCheck::new(
            "Requirement 55",
            "The tile_column column value in a tile pyramid user data table row SHALL be in the range 0 to matrix_width - 1 of its zoom level.",
            Severity::Error,
            check_tile_columns_in_range,
        ),
        RequirementCheck::new(
            "Requirement 56",
            "The tile_row column value in a tile pyramid user data table row SHALL be in the range 0 to matrix_height - 1 of its zoom level.",
            Severity::Error,
            check_tile_rows_in_range,
        ),
    ]
}

/// Verify the Tiles subsystem
pub fn verify(
    gpkg: &GeoPackage,
    level: VerificationLevel,
) -> Result<Vec<VerificationIssue>, VerificationError> {
    if level == VerificationLevel::None {
        return Ok(Vec::new());
    }

    let conn = gpkg.reader()?;
    if tile_tables(&conn)?.is_empty() && !table_exists(&conn, "gpkg_tile_matrix_set")? {
        return Ok(Vec::new());
    }

    run_requirement_checks(&Subsystem::Tiles, &checks(), &conn, gpkg)
}

/// Tables registered in `gpkg_contents` with a `tiles` data type
fn tile_tables(conn: &Connection) -> Result<Vec<String>, VerificationError> {
    if !table_exists(conn, "gpkg_contents")? {
        return Ok(Vec::new());
    }
    query_strings(
        conn,
        "SELECT table_name FROM gpkg_contents WHERE data_type = 'tiles' ORDER BY table_name",
    )
}

/// Tile tables that exist and carry every tile column
fn complete_tile_tables(conn: &Connection) -> Result<Vec<String>, VerificationError> {
    let mut tables = Vec::new();
    for table in tile_tables(conn)? {
        if table_exists(conn, &table)? && missing_columns(conn, &table, &TILE_COLUMNS)?.is_empty() {
            tables.push(table);
        }
    }
    Ok(tables)
}

fn check_tile_table_columns(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let mut problems = Vec::new();
    for table in tile_tables(conn)? {
        if !table_exists(conn, &table)? {
            // Requirement 14 reports tables that do not exist
            continue;
        }
        let missing = missing_columns(conn, &table, &TILE_COLUMNS)?;
        if !missing.is_empty() {
            problems.push(format!("{} lacks {}", table, missing.join(", ")));
        }
    }

    if problems.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Tile tables with missing columns: {}",
            describe_values(&problems)
        )))
    }
}

fn check_tile_matrix_set_exists(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    required_table(conn, "gpkg_tile_matrix_set")
}

fn check_tile_matrix_exists(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    required_table(conn, "gpkg_tile_matrix")
}

fn required_table(conn: &Connection, table: &str) -> Result<Option<String>, VerificationError> {
    let tables = tile_tables(conn)?;
    if tables.is_empty() || table_exists(conn, table)? {
        Ok(None)
    } else {
        Ok(Some(format!(
            "The {} table is missing but tile tables are present: {}",
            table,
            describe_values(&tables)
        )))
    }
}

fn check_tile_matrix_set_table_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    unregistered_table_names(conn, "gpkg_tile_matrix_set")
}

fn check_tile_matrix_table_names(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    unregistered_table_names(conn, "gpkg_tile_matrix")
}

/// Table names of `table` that are not registered as tiles content
fn unregistered_table_names(conn: &Connection, table: &str) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, table)? {
        return Ok(None);
    }

    let registered = tile_tables(conn)?;
    let unregistered: Vec<String> = query_strings(
        conn,
        &format!("SELECT DISTINCT table_name FROM {} ORDER BY table_name", table),
    )?
    .into_iter()
    .filter(|name| !registered.contains(name))
    .collect();

    if unregistered.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "{} rows reference tables that are not tiles content: {}",
            table,
            describe_values(&unregistered)
        )))
    }
}

fn check_tile_matrix_set_srs_ids(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_tile_matrix_set")? || !table_exists(conn, "gpkg_spatial_ref_sys")? {
        return Ok(None);
    }

    let dangling = query_strings(
        conn,
        "SELECT table_name || ' (' || srs_id || ')' FROM gpkg_tile_matrix_set \
         WHERE srs_id NOT IN (SELECT srs_id FROM gpkg_spatial_ref_sys) ORDER BY table_name",
    )?;

    if dangling.is_empty() {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Tile matrix sets reference undefined srs_id values: {}",
            describe_values(&dangling)
        )))
    }
}

/// `table_name zoom N` of every gpkg_tile_matrix row matching `condition`
fn matrix_rows_where(conn: &Connection, condition: &str) -> Result<Vec<String>, VerificationError> {
    if !table_exists(conn, "gpkg_tile_matrix")? {
        return Ok(Vec::new());
    }
    query_strings(
        conn,
        &format!(
            "SELECT table_name || ' zoom ' || zoom_level FROM gpkg_tile_matrix WHERE {} \
             ORDER BY table_name, zoom_level",
            condition
        ),
    )
}

fn matrix_violation(rows: Vec<String>, what: &str) -> Option<String> {
    if rows.is_empty() {
        None
    } else {
        Some(format!("{}: {}", what, describe_values(&rows)))
    }
}

fn check_zoom_levels(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let rows = matrix_rows_where(conn, "zoom_level < 0")?;
    Ok(matrix_violation(rows, "Negative zoom levels"))
}

fn check_matrix_sizes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let rows = matrix_rows_where(conn, "matrix_width < 1 OR matrix_height < 1")?;
    Ok(matrix_violation(rows, "Matrix sizes below 1"))
}

fn check_tile_sizes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let rows = matrix_rows_where(conn, "tile_width < 1 OR tile_height < 1")?;
    Ok(matrix_violation(rows, "Tile sizes below 1"))
}

fn check_pixel_sizes(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    let rows = matrix_rows_where(conn, "pixel_x_size <= 0 OR pixel_y_size <= 0")?;
    Ok(matrix_violation(rows, "Pixel sizes not greater than 0"))
}

fn check_tile_zoom_levels_defined(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_tile_matrix")? {
        return Ok(None);
    }

    let mut undefined = Vec::new();
    for table in complete_tile_tables(conn)? {
        let levels = query_strings(
            conn,
            &format!(
                "SELECT DISTINCT zoom_level FROM {} WHERE zoom_level NOT IN \
                 (SELECT zoom_level FROM gpkg_tile_matrix WHERE table_name = {}) ORDER BY zoom_level",
                quote_identifier(&table),
                quote_literal(&table)
            ),
        )?;
        undefined.extend(levels.into_iter().map(|level| format!("{} zoom {}", table, level)));
    }

    Ok(matrix_violation(undefined, "Tiles at zoom levels missing from gpkg_tile_matrix"))
}

fn check_tile_columns_in_range(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    tiles_out_of_range(conn, "tile_column", "matrix_width")
}

fn check_tile_rows_in_range(conn: &Connection, _gpkg: &GeoPackage) -> Result<Option<String>, VerificationError> {
    tiles_out_of_range(conn, "tile_row", "matrix_height")
}

/// Count tiles whose `column` falls outside `0..bound` of their zoom level
fn tiles_out_of_range(conn: &Connection, column: &str, bound: &str) -> Result<Option<String>, VerificationError> {
    if !table_exists(conn, "gpkg_tile_matrix")? {
        return Ok(None);
    }

    let mut problems = Vec::new();
    for table in complete_tile_tables(conn)? {
        let count = query_count(
            conn,
            &format!(
                "SELECT count(*) FROM {table} AS t JOIN gpkg_tile_matrix AS tm \
                 ON tm.table_name = {name} AND tm.zoom_level = t.zoom_level \
                 WHERE t.{column} < 0 OR t.{column} >= tm.{bound}",
                table = quote_identifier(&table),
                name = quote_literal(&table),
                column = column,
                bound = bound
            ),
        )?;
        if count > 0 {
            problems.push(format!("{} ({} tiles)", table, count));
        }
    }

    Ok(matrix_violation(
        problems,
        &format!("Tiles with {} outside 0 to {} - 1", column, bound),
    ))
}
