//! SQLite database header.
//!
//! The first 100 bytes of every SQLite 3 database. Multi-byte fields are
//! big-endian.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Magic string opening every SQLite 3 database
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Size of the database header in bytes
pub const HEADER_SIZE: usize = 100;

/// `application_id` of a GeoPackage 1.0 file ("GP10")
pub const APPLICATION_ID_GP10: u32 = 0x4750_3130;
/// `application_id` of a GeoPackage 1.1 file ("GP11")
pub const APPLICATION_ID_GP11: u32 = 0x4750_3131;
/// `application_id` of a GeoPackage 1.2+ file ("GPKG")
pub const APPLICATION_ID_GPKG: u32 = 0x4750_4B47;

const PAGE_SIZE_OFFSET: usize = 16;
const USER_VERSION_OFFSET: usize = 60;
const APPLICATION_ID_OFFSET: usize = 68;

/// Why a header could not be obtained
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The file could not be read; says nothing about its format
    #[error("cannot read database header: {0}")]
    Io(#[from] io::Error),
    #[error("file is too short to be an SQLite database")]
    TooShort,
    #[error("file does not start with the SQLite 3 header string")]
    BadMagic,
}

impl HeaderError {
    /// True if the bytes were read and are not an SQLite header
    pub fn is_format_error(&self) -> bool {
        !matches!(self, HeaderError::Io(_))
    }
}

/// Parsed fields of the database header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteHeader {
    pub page_size: u32,
    pub user_version: u32,
    pub application_id: u32,
}

impl SqliteHeader {
    /// Read and parse the header of the file at `path`
    pub fn read(path: &Path) -> Result<Self, HeaderError> {
        let mut file = File::open(path)?;
        let mut bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => HeaderError::TooShort,
            _ => HeaderError::Io(e),
        })?;
        Self::parse(&bytes)
    }

    /// Parse a header from its raw bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort);
        }
        if &bytes[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
            return Err(HeaderError::BadMagic);
        }

        // A stored page size of 1 means 65536
        let page_size = match read_u16(bytes, PAGE_SIZE_OFFSET) {
            1 => 65536,
            size => u32::from(size),
        };

        Ok(SqliteHeader {
            page_size,
            user_version: read_u32(bytes, USER_VERSION_OFFSET),
            application_id: read_u32(bytes, APPLICATION_ID_OFFSET),
        })
    }

    /// True if `application_id` names a GeoPackage version
    pub fn is_geopackage(&self) -> bool {
        matches!(
            self.application_id,
            APPLICATION_ID_GP10 | APPLICATION_ID_GP11 | APPLICATION_ID_GPKG
        )
    }

    /// `application_id` as four ASCII characters when printable
    pub fn application_id_text(&self) -> String {
        let bytes = self.application_id.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            bytes.iter().map(|&b| b as char).collect()
        } else {
            format!("0x{:08X}", self.application_id)
        }
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
