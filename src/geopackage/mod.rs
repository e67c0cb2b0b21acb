//! GeoPackage file access.
//!
//! A GeoPackage is an SQLite 3 database. Files are only ever opened
//! read-only. The primary connection is held for the lifetime of the
//! handle; subsystem verifiers read through their own connections from
//! [`GeoPackage::reader`], since an SQLite connection cannot be shared
//! between threads.

pub mod header;

pub use header::{HeaderError, SqliteHeader};

use crate::checks;
use crate::engine::VerificationEngine;
use crate::{Severity, VerificationError, VerificationLevel, VerifierError};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Mandatory GeoPackage 1.0 tables with the three default SRS rows.
///
/// Fixture SQL shared by the test suites and the benchmark.
#[doc(hidden)]
pub const CORE_SCHEMA_SQL: &str = "
    PRAGMA application_id = 1196437808;
    CREATE TABLE gpkg_spatial_ref_sys (
        srs_name TEXT NOT NULL,
        srs_id INTEGER NOT NULL PRIMARY KEY,
        organization TEXT NOT NULL,
        organization_coordsys_id INTEGER NOT NULL,
        definition TEXT NOT NULL,
        description TEXT
    );
    INSERT INTO gpkg_spatial_ref_sys VALUES
        ('WGS 84 geodetic', 4326, 'EPSG', 4326, 'GEOGCS[\"WGS 84\"]', NULL),
        ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
        ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL);
    CREATE TABLE gpkg_contents (
        table_name TEXT NOT NULL PRIMARY KEY,
        data_type TEXT NOT NULL,
        identifier TEXT UNIQUE,
        description TEXT DEFAULT '',
        last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        min_x DOUBLE, min_y DOUBLE, max_x DOUBLE, max_y DOUBLE,
        srs_id INTEGER,
        CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
    );
";

/// An open GeoPackage file
pub struct GeoPackage {
    path: PathBuf,
    header: SqliteHeader,
    connection: Mutex<Option<Connection>>,
}

impl GeoPackage {
    /// Open an existing GeoPackage read-only.
    ///
    /// With `VerificationLevel::Full` the Core requirements are checked as
    /// well and files with error-severity issues are refused.
    pub fn open(path: &Path, level: VerificationLevel) -> Result<Self, VerifierError> {
        let open_error = |message: String| VerifierError::EngineOpen {
            path: path.to_path_buf(),
            message,
        };

        let header = SqliteHeader::read(path).map_err(|e| open_error(e.to_string()))?;

        let connection = open_readonly(path).map_err(|e| open_error(e.to_string()))?;
        connection
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| open_error(e.to_string()))?;

        debug!(
            file = %path.display(),
            application_id = header.application_id,
            user_version = header.user_version,
            "opened GeoPackage"
        );

        let geopackage = GeoPackage {
            path: path.to_path_buf(),
            header,
            connection: Mutex::new(Some(connection)),
        };

        if level == VerificationLevel::Full {
            let issues = checks::core::verify(&geopackage, level)
                .map_err(|e| open_error(e.to_string()))?;
            let errors: Vec<_> = issues
                .iter()
                .filter(|issue| issue.severity() == Severity::Error)
                .map(|issue| issue.requirement().reference.clone())
                .collect();
            if !errors.is_empty() {
                return Err(open_error(format!(
                    "file fails core requirements: {}",
                    errors.join(", ")
                )));
            }
        }

        Ok(geopackage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Database header as read at open time
    pub fn header(&self) -> &SqliteHeader {
        &self.header
    }

    pub fn application_id(&self) -> u32 {
        self.header.application_id
    }

    pub fn user_version(&self) -> u32 {
        self.header.user_version
    }

    /// Open an additional read-only connection to this file
    pub fn reader(&self) -> Result<Connection, VerificationError> {
        let is_open = self
            .connection
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        if !is_open {
            return Err(VerificationError::Unavailable(format!(
                "'{}' is closed",
                self.path.display()
            )));
        }

        let connection = open_readonly(&self.path)?;
        connection.execute_batch("PRAGMA query_only=ON;")?;
        Ok(connection)
    }

    /// Close the primary connection
    pub fn close(self) -> Result<(), VerifierError> {
        let connection = match self.connection.into_inner() {
            Ok(connection) => connection,
            Err(poisoned) => poisoned.into_inner(),
        };

        match connection {
            Some(connection) => connection.close().map_err(|(_, e)| VerifierError::Io {
                context: format!("closing '{}'", self.path.display()),
                source: std::io::Error::other(e),
            }),
            None => Ok(()),
        }
    }
}

fn open_readonly(path: &Path) -> Result<Connection, rusqlite::Error> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Verification engine backed by SQLite GeoPackage files
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPackageEngine;

impl VerificationEngine for GeoPackageEngine {
    type Handle = GeoPackage;

    fn open(&self, path: &Path, level: VerificationLevel) -> Result<GeoPackage, VerifierError> {
        GeoPackage::open(path, level)
    }

    fn close(&self, handle: GeoPackage) -> Result<(), VerifierError> {
        handle.close()
    }
}
