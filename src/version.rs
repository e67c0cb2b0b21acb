//! Version and build information.
//!
//! Provides version, git commit, and build metadata, plus the names
//! printed in every report header.

use std::fmt;

/// Tool name used in report headers
pub const TOOL_NAME: &str = "GeoPackage Verifier Tool";

/// Name of the standard files are verified against
pub const SPECIFICATION_NAME: &str = "GeoPackage Encoding Standard Specification";

/// Version of the standard the requirement catalogue follows
pub const SPECIFICATION_VERSION: &str = "1.0";

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: &'static str,
    pub rustc_version: Option<&'static str>,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "gpkg-verifier {}", self.version)?;
        writeln!(f, "{} {}", SPECIFICATION_NAME, SPECIFICATION_VERSION)?;

        if let Some(commit) = self.commit {
            writeln!(f, "Commit: {}", commit)?;
        }

        if let Some(date) = self.build_date {
            writeln!(f, "Built: {}", date)?;
        }

        write!(f, "Target: {}", self.target)?;

        if let Some(rustc) = self.rustc_version {
            write!(f, "\nRustc: {}", rustc)?;
        }

        Ok(())
    }
}

/// Get build information
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GPKG_VERIFIER_GIT_HASH"),
        build_date: option_env!("GPKG_VERIFIER_BUILD_DATE"),
        target: env!("TARGET"),
        rustc_version: option_env!("GPKG_VERIFIER_RUSTC_VERSION"),
    }
}
