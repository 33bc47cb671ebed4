//! C1: `GraphStore` — an in-memory directed multigraph of tools and
//! capabilities, kept in sync with the relational store (spec.md §4.1).

pub mod repository;
mod sync;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{EdgeAttrs, EdgeSource, EdgeType, Node, NodeId, NodeKind};

pub use repository::{CapabilityDependencyRow, DependencyRow, GraphRepository};

/// An in-memory directed multigraph without self-loops: at most one edge
/// per ordered pair (§3 invariant).
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<(NodeId, NodeId), EdgeAttrs>,
    out_neighbors: HashMap<NodeId, Vec<NodeId>>,
    in_neighbors: HashMap<NodeId, Vec<NodeId>>,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all nodes and edges (used at the start of `sync`).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.out_neighbors.clear();
        self.in_neighbors.clear();
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    #[must_use]
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Ensure `id` exists as a node, auto-creating a capability node if the
    /// id follows the `capability:<uuid>` convention and isn't present yet
    /// (§4.1 `Sync` auto-creates capability nodes on demand).
    fn ensure_node(&mut self, id: &str) {
        if !self.has_node(id) {
            let kind = if Node::is_capability_id(id) {
                NodeKind::Capability
            } else {
                NodeKind::Tool
            };
            self.add_node(Node {
                id: id.to_string(),
                kind,
                display_name: id.to_string(),
                server: None,
                category: None,
                is_pure: None,
                metadata: serde_json::Value::Null,
            });
        }
    }

    /// Insert or update the edge `from -> to`. Ensures both endpoints
    /// exist first. Rejects self-loops. On update, `attrs` fully replaces
    /// the prior attributes except when the caller wants to preserve
    /// type/source, use [`GraphStore::bump_edge_count`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if `from == to` (no self-loops, §3 invariant).
    pub fn add_edge(&mut self, from: &str, to: &str, attrs: EdgeAttrs) -> Result<()> {
        if from == to {
            return Err(Error::SyncConsistency(format!("rejected self-loop at {from}")));
        }
        self.ensure_node(from);
        self.ensure_node(to);

        let key = (from.to_string(), to.to_string());
        if !self.edges.contains_key(&key) {
            self.out_neighbors
                .entry(from.to_string())
                .or_default()
                .push(to.to_string());
            self.in_neighbors
                .entry(to.to_string())
                .or_default()
                .push(from.to_string());
        }
        self.edges.insert(key, attrs);
        Ok(())
    }

    /// Increment `count` on an existing edge (re-evaluating promotion), or
    /// create a new edge with the given type/source if none exists.
    pub fn bump_edge_count(&mut self, from: &str, to: &str, default_type: EdgeType, default_source: EdgeSource) -> Result<()> {
        let key = (from.to_string(), to.to_string());
        if let Some(attrs) = self.edges.get_mut(&key) {
            attrs.increment_count();
            Ok(())
        } else {
            self.add_edge(from, to, EdgeAttrs::new(default_type, default_source, 1))
        }
    }

    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains_key(&(from.to_string(), to.to_string()))
    }

    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeAttrs> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    pub fn edge_mut(&mut self, from: &str, to: &str) -> Option<&mut EdgeAttrs> {
        self.edges.get_mut(&(from.to_string(), to.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, &EdgeAttrs)> {
        self.edges.iter().map(|((f, t), a)| (f, t, a))
    }

    #[must_use]
    pub fn out_neighbors(&self, id: &str) -> &[NodeId] {
        self.out_neighbors.get(id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn in_neighbors(&self, id: &str) -> &[NodeId] {
        self.in_neighbors.get(id).map_or(&[], Vec::as_slice)
    }

    /// Union of in- and out-neighbors, deduplicated.
    #[must_use]
    pub fn all_neighbors(&self, id: &str) -> Vec<NodeId> {
        let mut seen: Vec<NodeId> = self.out_neighbors(id).to_vec();
        for n in self.in_neighbors(id) {
            if !seen.contains(n) {
                seen.push(n.clone());
            }
        }
        seen
    }

    #[must_use]
    pub fn out_degree(&self, id: &str) -> usize {
        self.out_neighbors(id).len()
    }

    #[must_use]
    pub fn in_degree(&self, id: &str) -> usize {
        self.in_neighbors(id).len()
    }

    #[must_use]
    pub fn degree(&self, id: &str) -> usize {
        self.all_neighbors(id).len()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge density: `edges / (n * (n - 1))`, 0 for `n <= 1`.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.node_count() as f64;
        if n <= 1.0 {
            0.0
        } else {
            self.edge_count() as f64 / (n * (n - 1.0))
        }
    }

    /// Average edge weight across the whole graph, 0.0 if empty.
    #[must_use]
    pub fn average_edge_weight(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        self.edges.values().map(EdgeAttrs::weight).sum::<f64>() / self.edges.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(id: &str) -> Node {
        Node::tool(id, id, "srv")
    }

    #[test]
    fn no_self_loops() {
        let mut g = GraphStore::new();
        g.add_node(tool("a"));
        let err = g
            .add_edge("a", "a", EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Observed, 1))
            .unwrap_err();
        assert!(matches!(err, Error::SyncConsistency(_)));
    }

    #[test]
    fn add_edge_ensures_endpoints_and_neighbor_lists() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        assert!(g.has_node("a"));
        assert!(g.has_node("b"));
        assert_eq!(g.out_neighbors("a"), &["b".to_string()]);
        assert_eq!(g.in_neighbors("b"), &["a".to_string()]);
        assert_eq!(g.degree("a"), 1);
    }

    #[test]
    fn no_duplicate_ordered_edges() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Inferred, 1))
            .unwrap();
        assert_eq!(g.out_neighbors("a").len(), 1);
        assert_eq!(g.edge("a", "b").unwrap().edge_type, EdgeType::Sequence);
    }

    #[test]
    fn density_matches_formula() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g.add_edge("b", "c", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        // n=3, edges=2 => 2 / (3*2) = 0.333..
        assert!((g.density() - (2.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn capability_ids_auto_created_as_capability_kind() {
        let mut g = GraphStore::new();
        g.add_edge(
            "capability:11111111-1111-1111-1111-111111111111",
            "fs:read_file",
            EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1),
        )
        .unwrap();
        let cap = g
            .node("capability:11111111-1111-1111-1111-111111111111")
            .unwrap();
        assert_eq!(cap.kind, NodeKind::Capability);
    }
}
