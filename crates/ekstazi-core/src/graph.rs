//! Shared traversals over the string adjacency model.
//!
//! Both the dependency graph and the type hierarchy store their edges as
//! `name -> [name]` adjacency lists. The helpers here implement the
//! reachability and distance queries both of them need, so the two graph
//! types stay thin wrappers over the same model.
//!
//! Adjacency lists are [`IndexMap`]-backed: iteration follows insertion
//! order, which keeps the persisted files stable across runs.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::dijkstra;
use petgraph::graphmap::DiGraphMap;

/// Ordered `source -> targets` adjacency list keyed by symbol name.
///
/// Duplicate targets are permitted; callers that need a canonical edge set
/// run an explicit dedup pass before persisting.
pub type AdjacencyList = IndexMap<String, Vec<String>>;

/// Breadth-first reachability from `start`.
///
/// Returns every node reachable over one or more edges. `start` itself is
/// only included when a cycle leads back to it. A `start` that is not a
/// key of the adjacency list yields the empty set.
pub fn reach(start: &str, adj: &AdjacencyList) -> HashSet<String> {
    let mut reached: HashSet<&str> = HashSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        visited.insert(node);

        let Some(targets) = adj.get(node) else {
            continue;
        };
        for target in targets {
            reached.insert(target);
            if !visited.contains(target.as_str()) {
                queue.push_back(target);
            }
        }
    }

    reached.into_iter().map(str::to_owned).collect()
}

/// Returns a new adjacency list with every edge inverted.
pub fn reverse_edges(adj: &AdjacencyList) -> AdjacencyList {
    let mut reversed = AdjacencyList::new();
    for (src, targets) in adj {
        for target in targets {
            reversed
                .entry(target.clone())
                .or_default()
                .push(src.clone());
        }
    }
    reversed
}

/// Returns the leaf nodes of the graph.
///
/// A node is a leaf when its out-list is empty, or when it appears as a
/// target but has no adjacency entry of its own.
pub fn leaf_nodes(adj: &AdjacencyList) -> HashSet<String> {
    let mut leaves = HashSet::new();
    for (node, targets) in adj {
        if targets.is_empty() {
            leaves.insert(node.clone());
        }
        for target in targets {
            match adj.get(target) {
                None => {
                    leaves.insert(target.clone());
                }
                Some(out) if out.is_empty() => {
                    leaves.insert(target.clone());
                }
                Some(_) => {}
            }
        }
    }
    leaves
}

/// Longest breadth-first depth reachable from `start`.
///
/// The depth assigned on first visit is the unit-weight shortest distance,
/// so this is a dijkstra query over the graph view.
pub fn max_distance_from<'a>(start: &'a str, adj: &'a AdjacencyList) -> u32 {
    let view = graph_view(adj);
    if !view.contains_node(start) {
        return 0;
    }
    dijkstra(&view, start, None, |_| 1u32)
        .into_values()
        .max()
        .unwrap_or(0)
}

/// Maximum over all nodes of the longest breadth-first depth from that node.
pub fn max_distance(adj: &AdjacencyList) -> u32 {
    adj.keys()
        .map(|node| max_distance_from(node, adj))
        .max()
        .unwrap_or(0)
}

/// Mean of the longest depths taken from each leaf of the reversed graph.
///
/// Unspecified for graphs without leaves; callers must not invoke this on
/// an empty graph.
pub fn average_distance(adj: &AdjacencyList) -> f64 {
    let leaves = leaf_nodes(adj);
    let reversed = reverse_edges(adj);

    let distances: Vec<u32> = leaves
        .iter()
        .map(|leaf| max_distance_from(leaf, &reversed))
        .collect();

    let total: u64 = distances.iter().map(|&d| u64::from(d)).sum();
    total as f64 / distances.len() as f64
}

/// Number of distinct nodes, counting targets that have no entry.
pub fn node_count(adj: &AdjacencyList) -> usize {
    let mut nodes: HashSet<&str> = HashSet::new();
    for (node, targets) in adj {
        nodes.insert(node);
        for target in targets {
            nodes.insert(target);
        }
    }
    nodes.len()
}

/// Number of nodes that are not roots, i.e. total nodes minus the leaves
/// of the reversed graph.
pub fn nonroot_count(adj: &AdjacencyList) -> usize {
    let reversed = reverse_edges(adj);
    node_count(adj) - leaf_nodes(&reversed).len()
}

/// Builds a petgraph view of the adjacency list for distance queries.
/// Duplicate edges collapse; distances are unaffected.
fn graph_view(adj: &AdjacencyList) -> DiGraphMap<&str, ()> {
    let mut view = DiGraphMap::new();
    for (src, targets) in adj {
        view.add_node(src.as_str());
        for target in targets {
            view.add_edge(src.as_str(), target.as_str(), ());
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(edges: &[(&str, &str)]) -> AdjacencyList {
        let mut adj = AdjacencyList::new();
        for (src, dst) in edges {
            adj.entry((*src).to_owned())
                .or_default()
                .push((*dst).to_owned());
        }
        adj
    }

    #[test]
    fn reach_transitive() {
        let adj = adj(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let reached = reach("a", &adj);
        assert_eq!(reached.len(), 3);
        assert!(reached.contains("b"));
        assert!(reached.contains("c"));
        assert!(reached.contains("d"));
    }

    #[test]
    fn reach_excludes_start_without_cycle() {
        let adj = adj(&[("a", "b")]);
        assert!(!reach("a", &adj).contains("a"));
    }

    #[test]
    fn reach_includes_start_on_cycle() {
        let adj = adj(&[("a", "b"), ("b", "a")]);
        assert!(reach("a", &adj).contains("a"));
    }

    #[test]
    fn reach_missing_key_is_empty() {
        let adj = adj(&[("a", "b")]);
        assert!(reach("zzz", &adj).is_empty());
    }

    #[test]
    fn reverse_inverts_every_edge() {
        let adj = adj(&[("a", "b"), ("a", "c")]);
        let reversed = reverse_edges(&adj);
        assert_eq!(reversed["b"], vec!["a"]);
        assert_eq!(reversed["c"], vec!["a"]);
        assert!(!reversed.contains_key("a"));
    }

    #[test]
    fn leaves_cover_missing_and_empty_entries() {
        let mut adj = adj(&[("a", "b"), ("b", "c")]);
        adj.insert("d".to_owned(), Vec::new());
        let leaves = leaf_nodes(&adj);
        // c has no entry, d has an empty entry.
        assert_eq!(leaves.len(), 2);
        assert!(leaves.contains("c"));
        assert!(leaves.contains("d"));
    }

    #[test]
    fn max_distance_of_chain() {
        let adj = adj(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(max_distance_from("a", &adj), 3);
        assert_eq!(max_distance(&adj), 3);
    }

    #[test]
    fn max_distance_prefers_shortest_first_visit() {
        // Diamond with a shortcut: a->b->c and a->c. BFS visits c at
        // depth 1, so the max depth is 2 (via d), not 3.
        let adj = adj(&[("a", "b"), ("b", "c"), ("a", "c"), ("c", "d")]);
        assert_eq!(max_distance_from("a", &adj), 2);
    }

    #[test]
    fn average_distance_of_chain() {
        // Single leaf d; reversed chain d->c->b->a has depth 3.
        let adj = adj(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let avg = average_distance(&adj);
        assert!((avg - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn node_counts() {
        let adj = adj(&[("a", "b"), ("b", "c")]);
        assert_eq!(node_count(&adj), 3);
        // Roots: only a (leaf of the reversed graph); non-roots: b, c.
        assert_eq!(nonroot_count(&adj), 2);
    }
}
