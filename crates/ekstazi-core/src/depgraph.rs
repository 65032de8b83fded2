//! Function dependency graph with text persistence.
//!
//! An edge `callee -> caller` reads "the callee's changes propagate to the
//! caller": reachability from a changed function therefore returns every
//! transitive caller that must be re-examined.
//!
//! Construction is append-only and tolerates duplicate edges; callers run
//! [`DependencyGraph::dedup`] before persisting. The on-disk format is one
//! line per source node, `src;dst1;dst2`, with `;` as both the field and
//! the list delimiter.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::warn;

use crate::error::CoreError;
use crate::graph::{self, AdjacencyList};

const DELIM: char = ';';

/// Directed dependency graph keyed by demangled function name.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    adj: AdjacencyList,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `src` is depended on by `dst`. Self-loops are ignored.
    /// Duplicates are kept until [`Self::dedup`].
    pub fn add_dependency(&mut self, src: &str, dst: &str) {
        if src == dst {
            return;
        }
        self.adj.entry(src.to_owned()).or_default().push(dst.to_owned());
    }

    /// Returns whether a direct `src -> dst` edge exists.
    pub fn exists_dependency(&self, src: &str, dst: &str) -> bool {
        self.adj
            .get(src)
            .is_some_and(|targets| targets.iter().any(|t| t == dst))
    }

    /// Every function transitively depending on `start`.
    pub fn all_dependents(&self, start: &str) -> HashSet<String> {
        graph::reach(start, &self.adj)
    }

    /// Returns a new graph with every edge flipped.
    pub fn reverse(&self) -> DependencyGraph {
        let mut reversed = DependencyGraph::new();
        for (src, targets) in &self.adj {
            for target in targets {
                reversed.add_dependency(target, src);
            }
        }
        reversed
    }

    /// Sorts and uniques every target list.
    pub fn dedup(&mut self) {
        for targets in self.adj.values_mut() {
            targets.sort_unstable();
            targets.dedup();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    /// Number of source nodes with at least one outgoing edge.
    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn adjacency(&self) -> &AdjacencyList {
        &self.adj
    }

    /// Loads a graph from `path`. A missing file yields an empty graph.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let mut graph = DependencyGraph::new();
        if !path.exists() {
            warn!(path = %path.display(), "no dependency graph file, starting empty");
            return Ok(graph);
        }

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split(DELIM).filter(|f| !f.is_empty());
            let Some(src) = fields.next() else {
                continue;
            };
            for dst in fields {
                graph.add_dependency(src, dst);
            }
        }
        Ok(graph)
    }

    /// Saves the graph to `path`, one `src;dst1;dst2` line per source node.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (src, targets) in &self.adj {
            write!(writer, "{src}")?;
            for target in targets {
                write!(writer, "{DELIM}{target}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("callee()", "caller_a()");
        graph.add_dependency("callee()", "caller_b()");
        graph.add_dependency("caller_a()", "test_body()");
        graph
    }

    #[test]
    fn self_loop_is_a_no_op() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("f()", "f()");
        assert!(graph.is_empty());
    }

    #[test]
    fn exists_checks_direct_edges_only() {
        let graph = sample();
        assert!(graph.exists_dependency("callee()", "caller_a()"));
        assert!(!graph.exists_dependency("callee()", "test_body()"));
        assert!(!graph.exists_dependency("unknown()", "caller_a()"));
    }

    #[test]
    fn dependents_are_transitive() {
        let graph = sample();
        let dependents = graph.all_dependents("callee()");
        assert_eq!(dependents.len(), 3);
        assert!(dependents.contains("test_body()"));
    }

    #[test]
    fn dedup_sorts_and_uniques() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("f()", "b()");
        graph.add_dependency("f()", "a()");
        graph.add_dependency("f()", "b()");
        graph.dedup();
        assert_eq!(graph.adjacency()["f()"], vec!["a()", "b()"]);
    }

    #[test]
    fn reverse_flips_edges() {
        let graph = sample().reverse();
        assert!(graph.exists_dependency("caller_a()", "callee()"));
        assert!(graph.exists_dependency("test_body()", "caller_a()"));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DependencyGraph::load(&dir.path().join("nope.txt")).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depgraph.txt");

        let mut graph = sample();
        graph.dedup();
        graph.save(&path).unwrap();

        let loaded = DependencyGraph::load(&path).unwrap();
        assert_eq!(loaded.adjacency(), graph.adjacency());
    }

    #[test]
    fn save_format_is_semicolon_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depgraph.txt");

        let mut graph = DependencyGraph::new();
        graph.add_dependency("foo()", "bar()");
        graph.add_dependency("foo()", "baz()");
        graph.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        insta::assert_snapshot!(contents.trim_end(), @"foo();bar();baz()");
    }
}
