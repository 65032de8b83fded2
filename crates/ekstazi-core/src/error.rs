//! Core error types for ekstazi-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Per-line
//! persistence problems are not errors: malformed records are skipped with
//! a warning so that one corrupt line never poisons a whole metadata file.

use thiserror::Error;

/// Errors produced by the core graph and record types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Filesystem I/O failure while loading or saving metadata.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
