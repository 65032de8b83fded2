//! Analysis error types.
//!
//! Per-edge and per-line problems are isolated and logged, never raised;
//! the variants here cover the fatal cases: I/O against the metadata
//! directory and a test binary that cannot produce a listing.

use thiserror::Error;

use ekstazi_core::CoreError;
use ekstazi_gtest::GtestError;

/// Errors produced by the analysis pass.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Filesystem I/O failure in the metadata directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence failure in a core graph or record type.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The test binary could not be probed or listed.
    #[error(transparent)]
    Gtest(#[from] GtestError),
}
