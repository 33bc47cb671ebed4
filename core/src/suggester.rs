//! C8: `Suggester` — the main planning entry point, `Suggest(intent,
//! contextTools) -> SuggestedDAG | nil` (spec.md §4.8).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::DagScoringConfig;
use crate::dag;
use crate::episodic;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::hybrid_search::{self, SemanticSearch};
use crate::local_alpha::LocalAlpha;
use crate::metrics::Metrics;
use crate::spectral::SpectralCluster;
use crate::types::{Capability, DependencyPath, EpisodicContext, HybridResult, NodeId, SuggestedDag, Task, TaskKind};

/// Read port onto the capability store, queried for overlap-based
/// injection (§4.8.1).
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    async fn list_capabilities(&self) -> Result<Vec<Capability>>;
}

pub struct Suggester {
    config: DagScoringConfig,
    spectral: SpectralCluster,
}

impl Suggester {
    #[must_use]
    pub fn new(config: DagScoringConfig) -> Self {
        Self {
            config,
            spectral: SpectralCluster::default(),
        }
    }

    /// `Suggest` (§4.8 steps 1-9). Returns `Ok(None)` when no candidates
    /// survive hybrid search or confidence falls below
    /// `thresholds.suggestion_reject`.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::Error::CycleDetected`] from the DAG
    /// build step; the caller is expected to retain its previous DAG in
    /// that case (§4.7).
    #[allow(clippy::too_many_arguments)]
    pub async fn suggest(
        &mut self,
        graph: &GraphStore,
        metrics: &Metrics,
        local_alpha: &mut LocalAlpha,
        semantic: &dyn SemanticSearch,
        capability_repo: &dyn CapabilityRepository,
        intent: &str,
        context_tools: &[NodeId],
        observation_counts: &HashMap<NodeId, u64>,
        episodic: &EpisodicContext,
    ) -> Result<Option<SuggestedDag>> {
        let candidates = hybrid_search::search(
            semantic,
            local_alpha,
            graph,
            intent,
            context_tools,
            self.config.candidate_limit,
            observation_counts,
            true,
        )
        .await;
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut ranked = rank_by_combined(&self.config, metrics, candidates);
        ranked.truncate(self.config.top_n);
        if ranked.is_empty() {
            return Ok(None);
        }

        let avg_alpha = ranked.iter().map(|c| c.alpha).sum::<f64>() / ranked.len() as f64;

        let top_ids: Vec<NodeId> = ranked.iter().map(|c| c.id.clone()).collect();
        let mut tasks = dag::build(graph, &top_ids)?;

        let dependency_paths = enumerate_dependency_paths(&self.config, graph, &top_ids);

        let capabilities = capability_repo.list_capabilities().await.unwrap_or_default();
        let tool_ids_in_graph: Vec<String> = graph
            .nodes()
            .filter(|n| n.kind == crate::types::NodeKind::Tool)
            .map(|n| n.id.clone())
            .collect();
        inject_capabilities(
            &self.config,
            &mut self.spectral,
            &tool_ids_in_graph,
            &capabilities,
            &mut tasks,
            &top_ids,
            episodic,
        );

        let final_score_top = ranked[0].final_score;
        let avg_pr_top3 = {
            let n = ranked.len().min(3);
            ranked[..n].iter().map(|c| metrics.pagerank(&c.id)).sum::<f64>() / n as f64
        };
        let avg_path_conf = if dependency_paths.is_empty() {
            0.0
        } else {
            dependency_paths.iter().map(|p| p.confidence).sum::<f64>() / dependency_paths.len() as f64
        };

        let confidence = self.config.confidence_hybrid_bounds.interpolate(avg_alpha) * final_score_top
            + self.config.confidence_pagerank_bounds.interpolate(avg_alpha) * avg_pr_top3
            + self.config.confidence_path_bounds.interpolate(avg_alpha) * avg_path_conf;

        let thresholds = &self.config.thresholds;
        if confidence < thresholds.suggestion_reject {
            return Ok(None);
        }

        let warning = if confidence < thresholds.suggestion_floor {
            Some(format!("low confidence: {confidence:.2}"))
        } else {
            None
        };

        let rationale = rationale(&ranked[0], final_score_top, avg_pr_top3, dependency_paths.len());

        Ok(Some(SuggestedDag {
            tasks,
            confidence,
            rationale,
            warning,
            dependency_paths,
        }))
    }
}

fn rank_by_combined(config: &DagScoringConfig, metrics: &Metrics, candidates: Vec<HybridResult>) -> Vec<HybridResult> {
    let mut scored: Vec<(f64, HybridResult)> = candidates
        .into_iter()
        .map(|c| {
            let combined = config.ranking_hybrid_weight * c.final_score + config.ranking_pagerank_weight * metrics.pagerank(&c.id);
            (combined, c)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, c)| c).collect()
}

fn enumerate_dependency_paths(config: &DagScoringConfig, graph: &GraphStore, top_ids: &[NodeId]) -> Vec<DependencyPath> {
    let mut paths = Vec::new();
    for i in 0..top_ids.len() {
        for j in 0..top_ids.len() {
            if i == j {
                continue;
            }
            if let Some(hops) = dag::hop_count(graph, &top_ids[i], &top_ids[j]) {
                if hops <= config.max_dependency_hops {
                    paths.push(DependencyPath {
                        from: top_ids[i].clone(),
                        to: top_ids[j].clone(),
                        hops,
                        confidence: config.hop_confidence.for_hops(hops),
                    });
                }
            }
        }
    }
    paths
}

/// §4.8.1: inject capabilities whose `tools_used` overlap the DAG's tool
/// set above `overlap_threshold`, subject to episodic adjustment.
fn inject_capabilities(
    config: &DagScoringConfig,
    spectral: &mut SpectralCluster,
    tool_ids_in_graph: &[String],
    capabilities: &[Capability],
    tasks: &mut Vec<Task>,
    dag_tool_ids: &[NodeId],
    episodic: &EpisodicContext,
) {
    if capabilities.is_empty() {
        return;
    }
    let dag_tool_set: std::collections::HashSet<&str> = dag_tool_ids.iter().map(String::as_str).collect();
    let assignment = spectral.assignment(tool_ids_in_graph, capabilities);
    let active_cluster = assignment.active_cluster(dag_tool_ids);

    for cap in capabilities {
        if cap.tools_used.is_empty() {
            continue;
        }
        let overlap_count = cap.tools_used.iter().filter(|t| dag_tool_set.contains(t.as_str())).count();
        let overlap = overlap_count as f64 / cap.tools_used.len() as f64;
        if overlap < config.capability.overlap_threshold {
            continue;
        }

        let cluster_boost = assignment.cluster_boost(&cap.id, active_cluster);
        let discovery_score = (overlap * (1.0 + cluster_boost)).min(1.0);
        let raw_confidence =
            config.capability.confidence_floor + (config.capability.confidence_ceiling - config.capability.confidence_floor) * discovery_score;

        let Some(adjusted) = episodic::adjust(raw_confidence, episodic.get(&cap.node_id()), &config.episodic) else {
            continue;
        };
        if adjusted < config.capability.min_adjusted_confidence {
            continue;
        }

        let depends_on = tasks
            .iter()
            .filter(|t| cap.tools_used.contains(&t.node_id))
            .map(|t| t.task_id.clone())
            .collect::<Vec<_>>();
        let depends_on = if depends_on.is_empty() {
            tasks.last().map(|t| vec![t.task_id.clone()]).unwrap_or_default()
        } else {
            depends_on
        };

        tasks.push(Task {
            task_id: format!("task_{}", tasks.len()),
            node_id: cap.node_id(),
            kind: TaskKind::Capability,
            depends_on,
        });
    }
}

fn rationale(top: &HybridResult, final_score_top: f64, avg_pr_top3: f64, path_count: usize) -> String {
    format!(
        "Top candidate '{}': hybrid={:.2} (semantic={:.2}, graph={:.2}), pagerank~{:.2}, {} dependency path(s) considered",
        top.id, final_score_top, top.semantic_score, top.graph_score, avg_pr_top3, path_count
    )
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

    struct EmptyCapabilities;
    #[async_trait]
    impl CapabilityRepository for EmptyCapabilities {
        async fn list_capabilities(&self) -> Result<Vec<Capability>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn no_candidates_returns_none() {
        let g = GraphStore::new();
        let metrics = Metrics::empty();
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let semantic = FakeSemantic { hits: vec![] };
        let mut suggester = Suggester::new(DagScoringConfig::default());
        let result = suggester
            .suggest(&g, &metrics, &mut la, &semantic, &EmptyCapabilities, "do thing", &[], &HashMap::new(), &HashMap::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn strong_candidates_yield_a_confident_plan() {
        let mut g = GraphStore::new();
        g.add_edge("a", "b", EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Observed, 5))
            .unwrap();
        let metrics = Metrics::compute(&g);
        let mut la = LocalAlpha::new(LocalAlphaConfig::default());
        let semantic = FakeSemantic {
            hits: vec![("a".to_string(), 0.95), ("b".to_string(), 0.9)],
        };
        let mut suggester = Suggester::new(DagScoringConfig::default());
        let result = suggester
            .suggest(&g, &metrics, &mut la, &semantic, &EmptyCapabilities, "do thing", &[], &HashMap::new(), &HashMap::new())
            .await
            .unwrap();
        assert!(result.is_some());
        let dag = result.unwrap();
        assert!(dag.confidence > 0.0);
        assert!(!dag.tasks.is_empty());
    }
}
