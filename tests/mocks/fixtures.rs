//! GeoPackage fixtures built with rusqlite.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use gpkg_verifier::geopackage::CORE_SCHEMA_SQL as CORE_SCHEMA;

/// A tile pyramid whose matrix row at zoom 1 has a zero width, plus a
/// tile at an undefined zoom level
pub const BROKEN_TILES: &str = "
    CREATE TABLE gpkg_tile_matrix_set (
        table_name TEXT NOT NULL PRIMARY KEY,
        srs_id INTEGER NOT NULL,
        min_x DOUBLE NOT NULL, min_y DOUBLE NOT NULL,
        max_x DOUBLE NOT NULL, max_y DOUBLE NOT NULL
    );
    CREATE TABLE gpkg_tile_matrix (
        table_name TEXT NOT NULL,
        zoom_level INTEGER NOT NULL,
        matrix_width INTEGER NOT NULL,
        matrix_height INTEGER NOT NULL,
        tile_width INTEGER NOT NULL,
        tile_height INTEGER NOT NULL,
        pixel_x_size DOUBLE NOT NULL,
        pixel_y_size DOUBLE NOT NULL,
        CONSTRAINT pk_ttm PRIMARY KEY (table_name, zoom_level)
    );
    CREATE TABLE imagery (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zoom_level INTEGER NOT NULL,
        tile_column INTEGER NOT NULL,
        tile_row INTEGER NOT NULL,
        tile_data BLOB NOT NULL
    );
    INSERT INTO gpkg_contents (table_name, data_type, srs_id) VALUES ('imagery', 'tiles', 4326);
    INSERT INTO gpkg_tile_matrix_set VALUES ('imagery', 4326, -180.0, -90.0, 180.0, 90.0);
    INSERT INTO gpkg_tile_matrix VALUES ('imagery', 0, 2, 1, 256, 256, 0.703125, 0.703125);
    INSERT INTO gpkg_tile_matrix VALUES ('imagery', 1, 0, 2, 256, 256, 0.3515625, 0.3515625);
    INSERT INTO imagery (zoom_level, tile_column, tile_row, tile_data) VALUES (0, 0, 0, x'00'), (3, 0, 0, x'00');
";

/// Data columns pointing at a missing column and a missing constraint
pub const BROKEN_SCHEMA: &str = "
    CREATE TABLE gpkg_data_columns (
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        name TEXT,
        title TEXT,
        description TEXT,
        mime_type TEXT,
        constraint_name TEXT,
        CONSTRAINT pk_gdc PRIMARY KEY (table_name, column_name)
    );
    CREATE TABLE gpkg_data_column_constraints (
        constraint_name TEXT NOT NULL,
        constraint_type TEXT NOT NULL,
        value TEXT,
        min NUMERIC,
        minIsInclusive BOOLEAN,
        max NUMERIC,
        maxIsInclusive BOOLEAN,
        description TEXT
    );
    CREATE TABLE parcels (id INTEGER PRIMARY KEY, area DOUBLE);
    INSERT INTO gpkg_contents (table_name, data_type) VALUES ('parcels', 'attributes');
    INSERT INTO gpkg_data_columns VALUES ('parcels', 'owner', NULL, NULL, NULL, NULL, NULL);
    INSERT INTO gpkg_data_columns VALUES ('parcels', 'area', NULL, NULL, NULL, NULL, 'area_range');
";

/// A GeoPackage file in its own temp dir
pub struct GeoPackageFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl GeoPackageFixture {
    /// Core schema only
    pub fn valid() -> Self {
        Self::with_sql("")
    }

    /// Core schema plus `sql`, saved as `sample.gpkg`
    pub fn with_sql(sql: &str) -> Self {
        Self::named("sample.gpkg", &format!("{}\n{}", CORE_SCHEMA, sql))
    }

    /// Exactly `sql`, saved as `name`
    pub fn named(name: &str, sql: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        conn.close().unwrap();
        GeoPackageFixture { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
