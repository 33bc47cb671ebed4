//! C9: `Predictor` — passive next-step prediction, `PredictNext
//! (workflowState) -> PredictedNode[]` (spec.md §4.9).

use std::collections::{HashMap, HashSet};

use crate::config::DagScoringConfig;
use crate::constants::is_dangerous;
use crate::episodic;
use crate::graph::GraphStore;
use crate::hybrid_search::adamic_adar;
use crate::local_alpha::{LocalAlpha, Mode};
use crate::metrics::Metrics;
use crate::spectral::SpectralCluster;
use crate::suggester::CapabilityRepository;
use crate::types::{Capability, EdgeType, EpisodicContext, NodeId, NodeKind, PredictedNode, PredictionReason, WorkflowState};

pub struct Predictor {
    config: DagScoringConfig,
    spectral: SpectralCluster,
}

impl Predictor {
    #[must_use]
    pub fn new(config: DagScoringConfig) -> Self {
        Self {
            config,
            spectral: SpectralCluster::default(),
        }
    }

    /// `PredictNext` (§4.9 steps 1-7). Returns an empty vector if there is
    /// no anchor (no successful task yet).
    pub async fn predict_next(
        &mut self,
        graph: &GraphStore,
        metrics: &Metrics,
        local_alpha: &mut LocalAlpha,
        capability_repo: &dyn CapabilityRepository,
        workflow: &WorkflowState,
        observation_counts: &HashMap<NodeId, u64>,
        episodic: &EpisodicContext,
    ) -> Vec<PredictedNode> {
        let Some(anchor) = workflow.anchor() else {
            return Vec::new();
        };

        let executed: HashSet<&str> = workflow.executed.iter().map(String::as_str).collect();
        let excluded = |id: &str| executed.contains(id) || is_dangerous(id);

        let mut candidates: Vec<(NodeId, f64, PredictionReason)> = Vec::new();

        candidates.extend(self.community_predictions(graph, metrics, anchor, &excluded));
        candidates.extend(self.cooccurrence_predictions(graph, anchor, &excluded));

        let capabilities = capability_repo.list_capabilities().await.unwrap_or_default();
        candidates.extend(self.capability_predictions(graph, anchor, &executed, &capabilities, &excluded));
        candidates.extend(self.alternative_predictions(graph, &capabilities, &candidates));

        let mut predicted: HashMap<NodeId, (f64, PredictionReason)> = HashMap::new();
        for (id, base, reason) in candidates {
            if excluded(&id) {
                continue;
            }
            let observations = observation_counts.get(&id).copied().unwrap_or(0);
            let alpha = local_alpha.alpha(graph, &id, observations, Mode::PassiveSuggestion, &workflow.executed, None);
            let adjusted_by_alpha = (base * (1.5 - alpha)).min(0.95);

            let Some(adjusted) = episodic::adjust(adjusted_by_alpha, episodic.get(&id), &self.config.episodic) else {
                continue;
            };

            predicted
                .entry(id)
                .and_modify(|(existing, _)| {
                    if adjusted > *existing {
                        *existing = adjusted;
                    }
                })
                .or_insert((adjusted, reason));
        }

        let mut results: Vec<PredictedNode> = predicted
            .into_iter()
            .map(|(id, (confidence, reason))| {
                let kind = graph.node(&id).map_or(NodeKind::Tool, |n| n.kind);
                PredictedNode {
                    id,
                    kind,
                    confidence,
                    reason,
                }
            })
            .collect();
        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        results
    }

    /// §4.9 step 3.
    fn community_predictions(
        &self,
        graph: &GraphStore,
        metrics: &Metrics,
        anchor: &str,
        excluded: &impl Fn(&str) -> bool,
    ) -> Vec<(NodeId, f64, PredictionReason)> {
        let config = &self.config.community;
        metrics
            .community_members(anchor)
            .into_iter()
            .filter(|m| !excluded(m))
            .take(config.max_members)
            .map(|member| {
                let pr = metrics.pagerank(&member);
                let edge_weight = graph
                    .edge(anchor, &member)
                    .or_else(|| graph.edge(&member, anchor))
                    .map(crate::types::EdgeAttrs::weight)
                    .unwrap_or(0.0);
                let aa = adamic_adar(graph, anchor, &member);
                let base = config.base_confidence
                    + (pr * config.pagerank_weight).min(config.pagerank_cap)
                    + (edge_weight * config.edge_weight_weight).min(config.edge_weight_cap)
                    + (aa * config.adamic_adar_weight).min(config.adamic_adar_cap);
                (member, base.min(config.confidence_cap), PredictionReason::Community)
            })
            .collect()
    }

    /// §4.9 step 4.
    fn cooccurrence_predictions(&self, graph: &GraphStore, anchor: &str, excluded: &impl Fn(&str) -> bool) -> Vec<(NodeId, f64, PredictionReason)> {
        let config = &self.config.cooccurrence;
        graph
            .out_neighbors(anchor)
            .iter()
            .filter(|n| !excluded(n))
            .filter_map(|neighbor| {
                let attrs = graph.edge(anchor, neighbor)?;
                let count_boost = ((attrs.count as f64 + 1.0).log2() * 0.05).min(config.count_boost_cap);
                let recency_boost = recency_boost(attrs.last_observed, config.recency_boost_cap);
                let base = attrs.weight().min(config.edge_weight_cap) + count_boost + recency_boost;
                Some((neighbor.clone(), base.min(config.confidence_cap), PredictionReason::Cooccurrence))
            })
            .collect()
    }

    /// §4.9 step 5 / §4.8.1: capabilities whose tool set overlaps the
    /// anchor plus everything already executed.
    fn capability_predictions(
        &mut self,
        graph: &GraphStore,
        anchor: &str,
        executed: &HashSet<&str>,
        capabilities: &[Capability],
        excluded: &impl Fn(&str) -> bool,
    ) -> Vec<(NodeId, f64, PredictionReason)> {
        if capabilities.is_empty() {
            return Vec::new();
        }
        let config = &self.config.capability;
        let tool_ids_in_graph: Vec<String> = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Tool)
            .map(|n| n.id.clone())
            .collect();
        let context: Vec<NodeId> = std::iter::once(anchor.to_string())
            .chain(executed.iter().map(|s| s.to_string()))
            .collect();
        let assignment = self.spectral.assignment(&tool_ids_in_graph, capabilities);
        let active_cluster = assignment.active_cluster(&context);

        capabilities
            .iter()
            .filter(|cap| !excluded(&cap.node_id()) && cap.tools_used.iter().any(|t| t == anchor))
            .filter_map(|cap| {
                let overlap_count = cap.tools_used.iter().filter(|t| context.contains(t)).count();
                let overlap = overlap_count as f64 / cap.tools_used.len() as f64;
                if overlap < config.overlap_threshold {
                    return None;
                }
                let cluster_boost = assignment.cluster_boost(&cap.id, active_cluster);
                let discovery_score = (overlap * (1.0 + cluster_boost)).min(1.0);
                let confidence = config.confidence_floor + (config.confidence_ceiling - config.confidence_floor) * discovery_score;
                Some((cap.node_id(), confidence, PredictionReason::Capability))
            })
            .collect()
    }

    /// §4.9.1: alternatives to already-predicted capabilities, via the
    /// capability graph's `alternative` edges (treated symmetrically: an
    /// edge in either direction between two capability nodes counts).
    fn alternative_predictions(
        &self,
        graph: &GraphStore,
        capabilities: &[Capability],
        primary: &[(NodeId, f64, PredictionReason)],
    ) -> Vec<(NodeId, f64, PredictionReason)> {
        if capabilities.is_empty() {
            return Vec::new();
        }
        let by_id: HashMap<&str, &Capability> = capabilities.iter().map(|c| (c.id.as_str(), c)).collect();
        let primary_caps: Vec<(&Capability, f64)> = primary
            .iter()
            .filter(|(_, _, reason)| *reason == PredictionReason::Capability)
            .filter_map(|(node_id, score, _)| {
                let id = node_id.strip_prefix("capability:")?;
                by_id.get(id).map(|cap| (*cap, *score))
            })
            .collect();

        primary_caps
            .iter()
            .flat_map(|(primary_cap, primary_score)| {
                let primary_node_id = primary_cap.node_id();
                graph.all_neighbors(&primary_node_id).into_iter().filter_map(move |neighbor_id| {
                    let is_alternative = graph
                        .edge(&primary_node_id, &neighbor_id)
                        .or_else(|| graph.edge(&neighbor_id, &primary_node_id))
                        .is_some_and(|attrs| attrs.edge_type == EdgeType::Alternative);
                    if !is_alternative {
                        return None;
                    }
                    let candidate_id = neighbor_id.strip_prefix("capability:")?;
                    let candidate = by_id.get(candidate_id)?;
                    if candidate.success_rate <= self.config.reliability.min_success_rate_for_alternative {
                        return None;
                    }
                    Some((candidate.node_id(), primary_score * self.config.alternatives.primary_score_factor, PredictionReason::Alternative))
                })
            })
            .collect()
    }
}

fn recency_boost(last_observed: Option<chrono::DateTime<chrono::Utc>>, cap: f64) -> f64 {
    let Some(last_observed) = last_observed else {
        return 0.0;
    };
    let age_days = (chrono::Utc::now() - last_observed).num_seconds().max(0) as f64 / 86_400.0;
    (cap * (-age_days / 7.0).exp()).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalAlphaConfig;
    use crate::error::Result;
    use crate::types::{EdgeAttrs, EdgeSource, EdgeType};
    use async_trait::async_trait;

    struct EmptyCapabilities;
    #[async_trait]
    impl CapabilityRepository for EmptyCapabilities {
        async fn list_capabilities(&self) -> Result<Vec<Capability>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn no_anchor_returns_empty() {
        let g = GraphStore::new();
        let metrics = Metrics::empty();
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let mut predictor = Predictor::new(DagScoringConfig::default());
        let workflow = WorkflowState::default();
        let result = predictor
            .predict_next(&g, &metrics, &mut la, &EmptyCapabilities, &workflow, &HashMap::new(), &HashMap::new())
            .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn excludes_already_executed_and_dangerous_tools() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 3))
            .unwrap();
        g.add_edge("a", "fs:delete_file", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 3))
            .unwrap();
        let metrics = Metrics::compute(&g);
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let mut predictor = Predictor::new(DagScoringConfig::default());
        let workflow = WorkflowState {
            executed: vec!["a".to_string()],
            succeeded: vec![true],
            context_key: "ctx".to_string(),
        };
        let result = predictor
            .predict_next(&g, &metrics, &mut la, &EmptyCapabilities, &workflow, &HashMap::new(), &HashMap::new())
            .await;
        assert!(result.iter().all(|p| p.id != "a" && p.id != "fs:delete_file"));
        assert!(result.iter().any(|p| p.id == "b"));
    }
}
