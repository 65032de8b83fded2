//! Google-Test adapter: joins the IR world and the runner world.
//!
//! A test exists in two spellings that never match literally: the mangled
//! symbol of its body in the IR, and the line the runner prints under
//! `--gtest_list_tests`. This crate parses both into a common [`Test`]
//! value whose map key is derivable from either side, so the analysis can
//! translate modified functions into runner filter strings.

pub mod adapter;
pub mod error;

// Re-export commonly used types
pub use adapter::GtestAdapter;
pub use error::GtestError;
pub use test::{is_internal_function, is_test_name, Test, TestVariant};
