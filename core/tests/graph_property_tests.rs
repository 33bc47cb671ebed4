//! Property-based tests for `GraphStore`'s directed-multigraph invariants.

use graphrag_core::graph::GraphStore;
use graphrag_core::types::{EdgeAttrs, EdgeSource, EdgeType};
use proptest::prelude::*;

proptest! {
    /// No ordered pair `(id, id)` is ever accepted as an edge (§3 invariant).
    #[test]
    fn add_edge_never_admits_a_self_loop(id in "[a-z]{1,8}") {
        let mut g = GraphStore::new();
        let result = g.add_edge(&id, &id, EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Observed, 1));
        prop_assert!(result.is_err());
    }

    /// At most one edge survives per ordered pair, no matter how many times
    /// it's re-added (§3 invariant: "at most one edge per ordered pair").
    #[test]
    fn add_edge_collapses_to_one_edge_per_ordered_pair(from in "[a-z]{1,8}", to in "[a-z]{1,8}", repeats in 1u32..5) {
        prop_assume!(from != to);
        let mut g = GraphStore::new();
        for _ in 0..repeats {
            g.add_edge(&from, &to, EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1)).unwrap();
        }
        prop_assert_eq!(g.out_neighbors(&from).len(), 1);
        prop_assert_eq!(g.in_neighbors(&to).len(), 1);
    }

    /// Every edge endpoint is auto-created as a node, so degree is always
    /// defined for both sides of an edge just added.
    #[test]
    fn add_edge_ensures_both_endpoints_exist(from in "[a-z]{1,8}", to in "[a-z]{1,8}") {
        prop_assume!(from != to);
        let mut g = GraphStore::new();
        g.add_edge(&from, &to, EdgeAttrs::new(EdgeType::Contains, EdgeSource::Observed, 1)).unwrap();
        prop_assert!(g.has_node(&from));
        prop_assert!(g.has_node(&to));
    }
}
