//! C6: `HybridSearch` — blends an external semantic/ANN layer with graph
//! relatedness via a per-candidate `α` from [`crate::local_alpha`]
//! (spec.md §4.6).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::GraphStore;
use crate::local_alpha::{EmbeddingEvidence, LocalAlpha, Mode};
use crate::types::{HybridResult, NodeId, RelatedTool, RelationLabel};

/// The external semantic-search port: an embedding index plus nearest-
/// neighbor search, kept outside this crate's scope (§1 Non-goals).
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Top-`k` semantic matches for `query`, highest score first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<(NodeId, f64)>>;

    /// The stored embedding for a node, if any — used by `LocalAlpha`'s
    /// active-search algorithm.
    fn embedding(&self, id: &str) -> Option<Vec<f64>>;
}

/// Density-scaled expansion factor for the semantic candidate pool
/// (§4.6 step 1).
fn expansion_factor(density: f64) -> f64 {
    if density < 0.01 {
        1.5
    } else if density < 0.10 {
        2.0
    } else {
        3.0
    }
}

/// `AA(u,v) = Σ_{w∈N(u)∩N(v)} edge_weight(u,w) / log(deg(w))`, restricted
/// to common neighbors with degree ≥ 2 (§4.6 step 2).
pub fn adamic_adar(graph: &GraphStore, u: &str, v: &str) -> f64 {
    let neighbors_u: std::collections::HashSet<NodeId> = graph.all_neighbors(u).into_iter().collect();
    let neighbors_v: std::collections::HashSet<NodeId> = graph.all_neighbors(v).into_iter().collect();
    neighbors_u
        .intersection(&neighbors_v)
        .filter(|w| graph.degree(w) >= 2)
        .map(|w| {
            let weight = graph
                .edge(u, w)
                .or_else(|| graph.edge(w, u))
                .map(crate::types::EdgeAttrs::weight)
                .unwrap_or(0.0);
            weight / (graph.degree(w) as f64).ln()
        })
        .sum()
}

/// `computeGraphRelatedness`: 1.0 if a direct edge exists to any context
/// tool, else the Adamic-Adar score against the best-matching context
/// tool, halved and capped at 1.0 (§4.6 step 2).
fn graph_relatedness(graph: &GraphStore, candidate: &str, context: &[NodeId]) -> f64 {
    if context.iter().any(|c| graph.has_edge(candidate, c) || graph.has_edge(c, candidate)) {
        return 1.0;
    }
    let max_aa = context
        .iter()
        .map(|c| adamic_adar(graph, candidate, c))
        .fold(0.0_f64, f64::max);
    (max_aa / 2.0).min(1.0)
}

fn related_tools(graph: &GraphStore, id: &str) -> Vec<RelatedTool> {
    let mut related = Vec::new();
    for before in graph.in_neighbors(id) {
        related.push(RelatedTool {
            id: before.clone(),
            label: RelationLabel::OftenBefore,
        });
    }
    for after in graph.out_neighbors(id) {
        related.push(RelatedTool {
            id: after.clone(),
            label: RelationLabel::OftenAfter,
        });
    }
    related
}

/// Run a hybrid search for `query`, optionally grounded by `context`
/// (tool ids already in the current workflow). Any failure in the
/// semantic layer degrades gracefully to an empty result set rather than
/// propagating (§4.6 "Graceful degradation" covers per-candidate α
/// fallback; a hard semantic-search failure is handled by the caller
/// choosing not to call this at all, matching the DB-availability story
/// elsewhere in the engine).
pub async fn search(
    semantic: &dyn SemanticSearch,
    local_alpha: &mut LocalAlpha,
    graph: &GraphStore,
    query: &str,
    context: &[NodeId],
    limit: usize,
    observation_counts: &HashMap<NodeId, u64>,
    include_related: bool,
) -> Vec<HybridResult> {
    let expanded_k = ((limit as f64) * expansion_factor(graph.density())).ceil() as usize;
    let Ok(candidates) = semantic.search(query, expanded_k.max(limit)).await else {
        return Vec::new();
    };

    let mut results: Vec<HybridResult> = candidates
        .into_iter()
        .map(|(id, semantic_score)| {
            let graph_score = graph_relatedness(graph, &id, context);
            let observations = observation_counts.get(&id).copied().unwrap_or(0);

            let target_embedding = semantic.embedding(&id);
            let neighbor_embeddings: HashMap<NodeId, Vec<f64>> = graph
                .all_neighbors(&id)
                .into_iter()
                .filter_map(|n| semantic.embedding(&n).map(|e| (n, e)))
                .collect();
            let evidence = target_embedding.as_deref().map(|target| EmbeddingEvidence {
                target,
                neighbors: &neighbor_embeddings,
            });

            let alpha = local_alpha.alpha(graph, &id, observations, Mode::ActiveSearch, context, evidence);
            let final_score = alpha * semantic_score + (1.0 - alpha) * graph_score;

            HybridResult {
                related_tools: if include_related { related_tools(graph, &id) } else { Vec::new() },
                id,
                semantic_score,
                graph_score,
                alpha,
                final_score,
            }
        })
        .collect();

    results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalAlphaConfig;
    use crate::types::{EdgeAttrs, EdgeSource, EdgeType};

    struct FakeSemantic {
        hits: Vec<(NodeId, f64)>,
    }

    #[async_trait]
    impl SemanticSearch for FakeSemantic {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<(NodeId, f64)>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
        fn embedding(&self, _id: &str) -> Option<Vec<f64>> {
            None
        }
    }

    #[tokio::test]
    async fn direct_edge_to_context_gives_full_graph_score() {
        let mut g = GraphStore::new();
        g.add_edge("ctx", "cand", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 1))
            .unwrap();
        let semantic = FakeSemantic {
            hits: vec![("cand".to_string(), 0.4)],
        };
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let results = search(
            &semantic,
            &mut la,
            &g,
            "q",
            &["ctx".to_string()],
            5,
            &HashMap::new(),
            true,
        )
        .await;
        assert_eq!(results.len(), 1);
        assert!((results[0].graph_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn semantic_failure_degrades_to_empty() {
        struct Failing;
        #[async_trait]
        impl SemanticSearch for Failing {
            async fn search(&self, _q: &str, _k: usize) -> Result<Vec<(NodeId, f64)>> {
                Err(crate::error::Error::NoCandidates)
            }
            fn embedding(&self, _id: &str) -> Option<Vec<f64>> {
                None
            }
        }
        let g = GraphStore::new();
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let results = search(&Failing, &mut la, &g, "q", &[], 5, &HashMap::new(), false).await;
        assert!(results.is_empty());
    }

    #[test]
    fn expansion_factor_scales_with_sparsity() {
        assert!((expansion_factor(0.005) - 1.5).abs() < 1e-9);
        assert!((expansion_factor(0.05) - 2.0).abs() < 1e-9);
        assert!((expansion_factor(0.5) - 3.0).abs() < 1e-9);
    }
}
