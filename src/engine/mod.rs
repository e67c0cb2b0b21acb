//! Verification engine module.
//!
//! Provides subsystem orchestration, result aggregation, and report
//! rendering, plus the seam through which files are opened.

pub mod orchestrator;
pub mod report;
pub mod result;

use crate::{VerificationLevel, VerifierError};
use std::path::Path;

/// Opens and closes files for verification.
///
/// The orchestrator shares one handle between all subsystem workers, so
/// handles must be `Sync`. Handles are expected to release their
/// resources on drop as well as on `close`.
pub trait VerificationEngine: Send + Sync {
    type Handle: Send + Sync;

    /// Open `path` without validating it beyond what is needed to read it
    /// (when `level` is `None`).
    fn open(&self, path: &Path, level: VerificationLevel) -> Result<Self::Handle, VerifierError>;

    /// Close a handle returned by `open`.
    fn close(&self, handle: Self::Handle) -> Result<(), VerifierError>;
}
