//! Offline queries over a module's persisted metadata.
//!
//! These back the CLI tooling: dependency lookups for one function, and
//! summary statistics over the persisted graphs and selection results.
//! Queries prefer the previous generation of the dependency graph, since
//! that is what the last selection was computed against; when none exists
//! they fall back to the current graph with a warning.

use std::collections::HashSet;
use std::fs;

use serde::Serialize;
use tracing::warn;

use ekstazi_core::{load_records, DependencyGraph, FunctionMap, TypeHierarchy};

use crate::error::AnalysisError;
use crate::metadir::MetaDir;

/// Loaded metadata for dependency queries.
pub struct DepgraphQuery {
    old_depgraph: DependencyGraph,
    new_depgraph: DependencyGraph,
}

impl DepgraphQuery {
    pub fn load(metadir: &MetaDir) -> Result<Self, AnalysisError> {
        let depgraph_path = metadir.depgraph_path();
        Ok(DepgraphQuery {
            old_depgraph: DependencyGraph::load(&MetaDir::old_sibling(&depgraph_path))?,
            new_depgraph: DependencyGraph::load(&depgraph_path)?,
        })
    }

    /// Every function depending on `fun_name`.
    pub fn dependents(&self, fun_name: &str) -> HashSet<String> {
        if self.old_depgraph.is_empty() {
            warn!("no old dependency graph, computing dependents from the new graph");
            return self.new_depgraph.all_dependents(fun_name);
        }
        self.old_depgraph.all_dependents(fun_name)
    }

    /// Every function `fun_name` depends on.
    pub fn dependencies(&self, fun_name: &str) -> HashSet<String> {
        if self.old_depgraph.is_empty() {
            warn!("no old dependency graph, computing dependencies from the new graph");
            return self.new_depgraph.reverse().all_dependents(fun_name);
        }
        self.old_depgraph.reverse().all_dependents(fun_name)
    }
}

/// Summary statistics over one module's persisted metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStats {
    pub module: String,
    /// Invocation counter; `None` before the first run.
    pub invocations: Option<u32>,
    pub functions: usize,
    pub old_functions: usize,
    pub modified_functions: usize,
    pub selected_filters: usize,
    pub hierarchy_size: usize,
    pub derived_types: usize,
    pub hierarchy_max_depth: u32,
    /// Mean inheritance depth; `None` for an empty hierarchy.
    pub hierarchy_average_depth: Option<f64>,
}

/// Computes statistics from the persisted metadata of one module.
pub fn module_stats(metadir: &MetaDir) -> Result<ModuleStats, AnalysisError> {
    let new_functions: FunctionMap = load_records(&metadir.functions_path())?;
    let old_functions: FunctionMap =
        load_records(&MetaDir::old_sibling(&metadir.functions_path()))?;
    let hierarchy = TypeHierarchy::load(&metadir.hierarchy_path())?;

    Ok(ModuleStats {
        module: metadir.module_name().to_owned(),
        invocations: metadir.read_count(),
        functions: new_functions.len(),
        old_functions: old_functions.len(),
        modified_functions: count_lines(metadir.modified_functions_path()),
        selected_filters: count_lines(metadir.modified_tests_path()),
        hierarchy_size: hierarchy.size(),
        derived_types: hierarchy.derived_count(),
        hierarchy_max_depth: hierarchy.max_depth(),
        hierarchy_average_depth: if hierarchy.is_empty() {
            None
        } else {
            Some(hierarchy.average_depth())
        },
    })
}

fn count_lines(path: std::path::PathBuf) -> usize {
    fs::read_to_string(path)
        .map(|contents| contents.lines().filter(|line| !line.is_empty()).count())
        .unwrap_or(0)
}
