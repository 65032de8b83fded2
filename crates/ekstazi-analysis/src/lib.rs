//! The dependency-and-change analysis pass.
//!
//! One invocation analyzes one module: it rebuilds the call dependency
//! graph, the class hierarchy, and per-function checksums, diffs them
//! against the previous run's persisted state, and projects the affected
//! functions onto runner filter strings.
//!
//! # Modules
//!
//! - [`analyzer`] -- the pass itself (init, function walk, finalization)
//! - [`hasher`] -- location-insensitive structural function checksums
//! - [`metadir`] -- the `.ekstazi/` metadata directory and its rollover
//! - [`query`] -- offline queries over a module's persisted metadata
//! - [`vtable`] -- virtual table reconstruction from global initializers
//! - [`error`] -- error types for all failure modes

pub mod analyzer;
pub mod error;
pub mod hasher;
pub mod metadir;
pub mod query;
pub mod vtable;

pub use analyzer::{run_analysis, Analyzer};
pub use error::AnalysisError;
pub use metadir::MetaDir;
pub use query::{module_stats, DepgraphQuery, ModuleStats};

use std::path::PathBuf;

use serde::Serialize;

/// Options controlling one analysis invocation.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Root of the metadata directory. Defaults to `.ekstazi` relative to
    /// the working directory.
    pub metadata_root: PathBuf,

    /// Path to the compiled test binary used for the test listing.
    /// `None` means derive it from the module name by stripping the
    /// bitcode suffix.
    pub test_executable: Option<PathBuf>,

    /// Enable the constructor-liveness pruning of virtual edges.
    pub constructors: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            metadata_root: PathBuf::from(metadir::METADATA_DIRNAME),
            test_executable: None,
            constructors: true,
        }
    }
}

/// Result of one analysis invocation.
///
/// The timings are advisory instrumentation and never influence the
/// analysis itself.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    /// Module basename the metadata files are keyed by.
    pub module: String,
    /// Invocation counter after this run; `1` means first run.
    pub invocation: u32,
    /// Functions registered from this module.
    pub functions: usize,
    /// Virtual tables reconstructed.
    pub vtables: usize,
    /// Pending virtual edges recorded during the walk.
    pub virtual_calls: usize,
    /// Classes with a constructor reachable from a test.
    pub constructed_classes: usize,
    /// Directly modified functions before propagation.
    pub directly_modified: usize,
    /// Affected functions after propagation.
    pub affected: usize,
    /// Filter strings selected for re-execution.
    pub selected_filters: usize,
    pub initialization_ms: u64,
    pub analysis_ms: u64,
    pub finalization_ms: u64,
}
