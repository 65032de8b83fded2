//! Adapter error types.
//!
//! Both variants beyond I/O are fatal by design: without a listing the
//! selection cannot be trusted, so there is nothing to recover to.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while talking to the compiled test binary.
#[derive(Debug, Error)]
pub enum GtestError {
    /// The configured executable does not advertise the gtest flags.
    #[error("not a gtest executable: {}", path.display())]
    NotAGtestBinary { path: PathBuf },

    /// The test listing ended in the middle of a test case.
    #[error("unexpected end of test listing")]
    UnexpectedEndOfListing,

    /// Spawning or reading the test binary failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
