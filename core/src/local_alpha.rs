//! C5: `LocalAlpha` — the per-node blending coefficient selector
//! (spec.md §4.5). Produces `α ∈ [0.5, 1.0]`: 1.0 trusts the semantic
//! signal only, 0.5 fully incorporates the graph signal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::LocalAlphaConfig;
use crate::graph::GraphStore;
use crate::types::{EdgeType, NodeId, NodeKind};

/// Which call site is asking for `α`, since the selection rule (§4.5)
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ActiveSearch,
    PassiveSuggestion,
}

/// Evidence available to `EmbeddingsPatternCoherence`: the target's own
/// semantic embedding and its neighbors'.
pub struct EmbeddingEvidence<'a> {
    pub target: &'a [f64],
    pub neighbors: &'a HashMap<NodeId, Vec<f64>>,
}

/// Owns the 60s-TTL heat cache (§4.5.4 "Caching").
pub struct LocalAlpha {
    config: LocalAlphaConfig,
    heat_cache: HashMap<NodeId, (Instant, f64)>,
}

impl LocalAlpha {
    #[must_use]
    pub fn new(config: LocalAlphaConfig) -> Self {
        Self {
            config,
            heat_cache: HashMap::new(),
        }
    }

    /// Invalidate the heat cache — called on `setSpectralClustering` or
    /// explicitly (§4.5.4).
    pub fn invalidate_cache(&mut self) {
        self.heat_cache.clear();
    }

    /// Select and run the appropriate algorithm for `target` (§4.5 steps
    /// 1-4).
    #[must_use]
    pub fn alpha(
        &mut self,
        graph: &GraphStore,
        target: &str,
        observations: u64,
        mode: Mode,
        context: &[NodeId],
        embeddings: Option<EmbeddingEvidence<'_>>,
    ) -> f64 {
        if observations < self.config.cold_start.threshold {
            return bayesian(&self.config, observations);
        }

        match mode {
            Mode::ActiveSearch => embeddings
                .and_then(|ev| embeddings_pattern_coherence(graph, target, ev))
                .unwrap_or(1.0),
            Mode::PassiveSuggestion => {
                let kind = graph.node(target).map(|n| n.kind);
                match kind {
                    Some(NodeKind::Tool) | None => self.heat_diffusion(graph, target, context),
                    Some(_) => self.hierarchical_heat(graph, target, context, kind.unwrap()),
                }
            }
        }
    }

    fn cached_heat(&mut self, id: &str) -> Option<f64> {
        let ttl = Duration::from_secs(self.config.heat_cache_ttl_secs);
        self.heat_cache
            .get(id)
            .filter(|(at, _)| at.elapsed() < ttl)
            .map(|(_, h)| *h)
    }

    fn store_heat(&mut self, id: &str, heat: f64) {
        self.heat_cache.insert(id.to_string(), (Instant::now(), heat));
    }

    /// §4.5.3: heat diffusion for tool-kind targets.
    fn heat_diffusion(&mut self, graph: &GraphStore, target: &str, context: &[NodeId]) -> f64 {
        let h_target = self.node_heat(graph, target);
        let context_heat = mean_heat(self, graph, context);
        let path_heat = path_heat(graph, target, context);

        let w = &self.config.heat_diffusion;
        let structural = w.intrinsic * h_target + w.neighbor * context_heat + w.path * path_heat;
        (1.0 - 0.5 * structural).max(self.config.alpha_min)
    }

    /// §4.5.4: as heat diffusion, but the target's contribution is a
    /// per-kind weighted blend of intrinsic heat, neighbor heat, and
    /// hierarchy-propagated heat (bottom-up from children, top-down from
    /// parents, capped at depth 3).
    fn hierarchical_heat(&mut self, graph: &GraphStore, target: &str, context: &[NodeId], kind: NodeKind) -> f64 {
        let h_target = self.node_heat(graph, target);
        let context_heat = mean_heat(self, graph, context);
        let hierarchy_heat = self.hierarchy_propagated_heat(graph, target);

        let weights = match kind {
            NodeKind::Tool => self.config.hierarchy.tool,
            NodeKind::Capability => self.config.hierarchy.capability,
            NodeKind::Meta | NodeKind::Operation => self.config.hierarchy.meta,
        };
        let structural = weights[0] * h_target + weights[1] * context_heat + weights[2] * hierarchy_heat;
        (1.0 - 0.5 * structural).max(self.config.alpha_min)
    }

    fn node_heat(&mut self, graph: &GraphStore, id: &str) -> f64 {
        if let Some(cached) = self.cached_heat(id) {
            return cached;
        }
        let heat = compute_node_heat(graph, id, &self.config.degree_heat);
        self.store_heat(id, heat);
        heat
    }

    fn hierarchy_propagated_heat(&mut self, graph: &GraphStore, target: &str) -> f64 {
        let max_depth = self.config.inheritance.max_depth;
        let bottom_up = self.propagate(graph, target, Direction::Children, max_depth);
        let top_down = self.propagate(graph, target, Direction::Parents, max_depth);
        (bottom_up + top_down) / 2.0
    }

    fn propagate(&mut self, graph: &GraphStore, node: &str, direction: Direction, remaining_depth: usize) -> f64 {
        if remaining_depth == 0 {
            return self.node_heat(graph, node);
        }
        let related: Vec<NodeId> = match direction {
            Direction::Children => graph
                .out_neighbors(node)
                .iter()
                .filter(|to| graph.edge(node, to).is_some_and(|a| a.edge_type == EdgeType::Contains))
                .cloned()
                .collect(),
            Direction::Parents => graph
                .in_neighbors(node)
                .iter()
                .filter(|from| graph.edge(from, node).is_some_and(|a| a.edge_type == EdgeType::Contains))
                .cloned()
                .collect(),
        };
        if related.is_empty() {
            return self.node_heat(graph, node);
        }
        let factor = match direction {
            Direction::Children => self.config.inheritance.capability_to_tool,
            Direction::Parents => self.config.inheritance.meta_to_capability,
        };
        let child_heats: f64 = related
            .iter()
            .map(|id| self.propagate(graph, id, direction, remaining_depth - 1))
            .sum::<f64>()
            / related.len() as f64;
        factor * child_heats + (1.0 - factor) * self.node_heat(graph, node)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Children,
    Parents,
}

/// §4.5.1 Bayesian cold-start: `confidence = observations/5`,
/// `α = prior·(1−confidence) + target·confidence`.
fn bayesian(config: &LocalAlphaConfig, observations: u64) -> f64 {
    let confidence = (observations as f64 / config.cold_start.threshold as f64).min(1.0);
    config.cold_start.prior * (1.0 - confidence) + config.cold_start.target * confidence
}

/// §4.5.2: correlate per-neighbor semantic similarity against per-neighbor
/// structural similarity; fall back to `None` (caller maps to α=1.0) when
/// embeddings, neighbors (<2), or correlation are unavailable.
fn embeddings_pattern_coherence(graph: &GraphStore, target: &str, ev: EmbeddingEvidence<'_>) -> Option<f64> {
    let neighbors = graph.all_neighbors(target);
    if neighbors.len() < 2 {
        return None;
    }

    let max_incident_weight = neighbors
        .iter()
        .filter_map(|n| graph.edge(target, n).or_else(|| graph.edge(n, target)))
        .map(crate::types::EdgeAttrs::weight)
        .fold(0.0_f64, f64::max);
    if max_incident_weight <= 0.0 {
        return None;
    }

    let mut semantic = Vec::with_capacity(neighbors.len());
    let mut structural = Vec::with_capacity(neighbors.len());
    for n in &neighbors {
        let Some(neighbor_embedding) = ev.neighbors.get(n) else {
            continue;
        };
        semantic.push(cosine_similarity(ev.target, neighbor_embedding));
        let w = graph
            .edge(target, n)
            .or_else(|| graph.edge(n, target))
            .map(crate::types::EdgeAttrs::weight)
            .unwrap_or(0.0);
        structural.push(w / max_incident_weight);
    }

    if semantic.len() < 2 {
        return None;
    }

    let r = pearson_correlation(&semantic, &structural)?;
    let n = (r + 1.0) / 2.0;
    Some((1.0 - n * 0.5).max(0.5))
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= 0.0 || norm_b <= 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

fn compute_node_heat(graph: &GraphStore, id: &str, weights: &crate::config::DegreeHeatWeights) -> f64 {
    let max_degree = graph.node_ids().map(|n| graph.degree(n)).max().unwrap_or(0).max(1) as f64;
    let own = (graph.degree(id) as f64 / max_degree).min(1.0);
    let neighbors = graph.all_neighbors(id);
    let neighbor_mean = if neighbors.is_empty() {
        0.0
    } else {
        let sum: f64 = neighbors.iter().map(|n| graph.degree(n) as f64).sum();
        (sum / neighbors.len() as f64 / max_degree).min(1.0)
    };
    weights.own_degree * own + weights.neighbor_degree * neighbor_mean
}

fn mean_heat(local_alpha: &mut LocalAlpha, graph: &GraphStore, context: &[NodeId]) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    context.iter().map(|id| local_alpha.node_heat(graph, id)).sum::<f64>() / context.len() as f64
}

fn path_heat(graph: &GraphStore, target: &str, context: &[NodeId]) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    let target_neighbors: std::collections::HashSet<NodeId> = graph.all_neighbors(target).into_iter().collect();
    let scores: Vec<f64> = context
        .iter()
        .map(|ctx| {
            if graph.has_edge(target, ctx) || graph.has_edge(ctx, target) {
                1.0
            } else {
                let ctx_neighbors: std::collections::HashSet<NodeId> = graph.all_neighbors(ctx).into_iter().collect();
                let common = target_neighbors.intersection(&ctx_neighbors).count();
                (common as f64 * 0.2).min(1.0)
            }
        })
        .collect();
    scores.iter().sum::<f64>() / scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeAttrs, EdgeSource};

    fn chain() -> GraphStore {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 5))
            .unwrap();
        g.add_edge("b", "c", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 5))
            .unwrap();
        g
    }

    #[test]
    fn cold_start_decreases_toward_target_as_evidence_grows() {
        let config = LocalAlphaConfig::default();
        let a0 = bayesian(&config, 0);
        let a3 = bayesian(&config, 3);
        let a5 = bayesian(&config, 5);
        assert!((a0 - 1.0).abs() < 1e-9);
        assert!(a3 < a0);
        assert!((a5 - 0.7).abs() < 1e-9);
    }

    #[test]
    fn heat_diffusion_alpha_within_bounds() {
        let g = chain();
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let alpha = la.heat_diffusion(&g, "b", &["a".to_string()]);
        assert!((0.5..=1.0).contains(&alpha));
    }

    #[test]
    fn pattern_coherence_falls_back_without_enough_neighbors() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 5))
            .unwrap();
        let empty = HashMap::new();
        let ev = EmbeddingEvidence {
            target: &[1.0, 0.0],
            neighbors: &empty,
        };
        assert!(embeddings_pattern_coherence(&g, "a", ev).is_none());
    }

    #[test]
    fn pearson_none_for_constant_vectors() {
        assert!(pearson_correlation(&[1.0, 1.0, 1.0], &[0.5, 0.2, 0.9]).is_none());
    }

    #[test]
    fn dispatch_uses_bayesian_below_cold_start_threshold() {
        let g = chain();
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let alpha = la.alpha(&g, "b", 1, Mode::PassiveSuggestion, &[], None);
        assert!((alpha - bayesian(&LocalAlphaConfig::default(), 1)).abs() < 1e-9);
    }
}
