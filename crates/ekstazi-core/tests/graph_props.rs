//! Property tests for the graph and record invariants.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use ekstazi_core::{modified_between, DependencyGraph, FunctionMap, FunctionRecord};

/// Canonical edge-set view of a graph, independent of insertion order.
fn normalized(graph: &DependencyGraph) -> BTreeMap<String, BTreeSet<String>> {
    graph
        .adjacency()
        .iter()
        .map(|(src, targets)| (src.clone(), targets.iter().cloned().collect()))
        .collect()
}

fn build(edges: &[(u8, u8)]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (a, b) in edges {
        graph.add_dependency(&format!("n{a}"), &format!("n{b}"));
    }
    graph
}

proptest! {
    /// reverse(reverse(G)) has the same edge set as G after dedup.
    #[test]
    fn double_reverse_preserves_edges(edges in prop::collection::vec((0u8..8, 0u8..8), 0..40)) {
        let graph = build(&edges);

        let mut once = graph.clone();
        once.dedup();

        let mut twice = graph.reverse().reverse();
        twice.dedup();

        prop_assert_eq!(normalized(&once), normalized(&twice));
    }

    /// On acyclic graphs, no node reaches itself.
    #[test]
    fn no_self_reach_without_cycles(pairs in prop::collection::vec((0u8..8, 0u8..8), 0..40)) {
        // Orient every edge from the smaller to the larger index so the
        // graph is a DAG by construction.
        let edges: Vec<(u8, u8)> = pairs
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        let graph = build(&edges);

        for node in 0u8..8 {
            let name = format!("n{node}");
            prop_assert!(!graph.all_dependents(&name).contains(&name));
        }
    }

    /// Diffing a record map against itself is always empty.
    #[test]
    fn self_diff_is_empty(entries in prop::collection::vec((0u8..16, any::<u64>()), 0..24)) {
        let records: FunctionMap = entries
            .into_iter()
            .map(|(name, checksum)| {
                let name = format!("f{name}()");
                (name.clone(), FunctionRecord::new(name, "m.cc", checksum.to_string()))
            })
            .collect();

        prop_assert!(modified_between(&records, &records).is_empty());
    }

    /// save followed by load reproduces the deduplicated graph.
    #[test]
    fn save_load_identity(edges in prop::collection::vec((0u8..6, 0u8..6), 0..30)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depgraph.txt");

        let mut graph = build(&edges);
        graph.dedup();
        graph.save(&path).unwrap();

        let loaded = DependencyGraph::load(&path).unwrap();
        prop_assert_eq!(normalized(&loaded), normalized(&graph));
    }
}
