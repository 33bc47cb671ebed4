//! Core data model (spec § 3): nodes, edges, capabilities, episodes, and
//! the result types produced by the `Suggester` and `Predictor`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{source_modifier, type_weight};

/// Node identifier. Two conventions coexist: `server:tool` for tool/operation
/// nodes and `capability:<uuid>` for capability nodes.
pub type NodeId = String;

/// Node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Tool,
    Operation,
    Capability,
    Meta,
}

/// A node in the tool/capability knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub display_name: String,
    /// Owning server, set for `Tool` nodes.
    pub server: Option<String>,
    /// Set for `Operation` nodes.
    pub category: Option<String>,
    /// Purity flag, set for `Operation` nodes.
    pub is_pure: Option<bool>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Node {
    #[must_use]
    pub fn tool(id: impl Into<String>, display_name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Tool,
            display_name: display_name.into(),
            server: Some(server.into()),
            category: None,
            is_pure: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn capability(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Capability,
            display_name: display_name.into(),
            server: None,
            category: None,
            is_pure: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Capability node ids follow `capability:<uuid>` (§3 invariant).
    #[must_use]
    pub fn is_capability_id(id: &str) -> bool {
        id.starts_with("capability:")
    }
}

/// Edge type. Carries a fixed type weight (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Dependency,
    Contains,
    Alternative,
    Provides,
    Sequence,
}

/// Edge provenance. `User` is rank-pinned to a fixed confidence on creation
/// rather than participating in the type x source product (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Observed,
    Inferred,
    Template,
    User,
}

/// Mutable edge attributes. `weight` is always recomputed from
/// `(edge_type, source)` — never set directly — per the invariant that
/// weight is a pure function of type and source at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub edge_type: EdgeType,
    pub source: EdgeSource,
    pub count: u64,
    weight: f64,
    pub last_observed: Option<DateTime<Utc>>,
}

impl EdgeAttrs {
    #[must_use]
    pub fn new(edge_type: EdgeType, source: EdgeSource, count: u64) -> Self {
        let weight = Self::compute_weight(edge_type, source);
        Self {
            edge_type,
            source,
            count,
            weight,
            last_observed: None,
        }
    }

    /// User-defined edges carry a fixed confidence of 0.90 regardless of
    /// the type/source product (§3).
    #[must_use]
    pub fn new_user(edge_type: EdgeType) -> Self {
        Self {
            edge_type,
            source: EdgeSource::User,
            count: 0,
            weight: crate::constants::USER_EDGE_CONFIDENCE,
            last_observed: None,
        }
    }

    fn compute_weight(edge_type: EdgeType, source: EdgeSource) -> f64 {
        if matches!(source, EdgeSource::User) {
            return crate::constants::USER_EDGE_CONFIDENCE;
        }
        type_weight(edge_type) * source_modifier(source)
    }

    /// Current derived weight.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Mutate type and/or source, recomputing weight atomically so the two
    /// never drift out of sync (§3 invariant).
    pub fn set_type_source(&mut self, edge_type: EdgeType, source: EdgeSource) {
        self.edge_type = edge_type;
        self.source = source;
        self.weight = Self::compute_weight(edge_type, source);
    }

    /// Increment the observation count and re-evaluate the
    /// inferred -> observed promotion rule (§4.3).
    pub fn increment_count(&mut self) {
        self.count += 1;
        if matches!(self.source, EdgeSource::Inferred) && self.count >= crate::constants::PROMOTION_THRESHOLD {
            self.source = EdgeSource::Observed;
        }
        self.weight = Self::compute_weight(self.edge_type, self.source);
    }

    /// Shortest-path traversal cost: cheaper for higher-weight edges
    /// (§4.3).
    #[must_use]
    pub fn cost(&self) -> f64 {
        1.0 / self.weight.max(0.1)
    }
}

/// A capability: a learned, named workflow fragment (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub tools_used: Vec<String>,
    pub success_rate: f64,
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Capability {
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        format!("capability:{}", self.id)
    }
}

/// Per-tool/capability aggregate drawn from episodic memory for a hashed
/// workflow context (§3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EpisodeAggregate {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
}

impl EpisodeAggregate {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }

    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Episodic memory read interface, keyed by a hash of the workflow context.
pub type EpisodicContext = HashMap<String, EpisodeAggregate>;

/// Task type within a suggested DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Tool,
    Capability,
}

/// One task in a suggested DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub node_id: NodeId,
    pub kind: TaskKind,
    pub depends_on: Vec<String>,
}

/// A dependency path enumerated between two top candidates, used for
/// explainability and per-hop confidence (§4.8 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyPath {
    pub from: NodeId,
    pub to: NodeId,
    pub hops: usize,
    pub confidence: f64,
}

/// Result of `Suggester::suggest` (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedDag {
    pub tasks: Vec<Task>,
    pub confidence: f64,
    pub rationale: String,
    pub warning: Option<String>,
    pub dependency_paths: Vec<DependencyPath>,
}

/// Relation label attached to a related tool in hybrid search output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationLabel {
    OftenBefore,
    OftenAfter,
}

/// A related tool surfaced alongside a hybrid search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedTool {
    pub id: NodeId,
    pub label: RelationLabel,
}

/// One ranked result from `HybridSearch` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridResult {
    pub id: NodeId,
    pub semantic_score: f64,
    pub graph_score: f64,
    pub alpha: f64,
    pub final_score: f64,
    pub related_tools: Vec<RelatedTool>,
}

/// A node predicted to be the next likely step (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub confidence: f64,
    pub reason: PredictionReason,
}

/// Why a node was predicted, for explainability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionReason {
    Community,
    Cooccurrence,
    Capability,
    Alternative,
}

/// A `provides` edge derived from tool schema overlap (§4 DB contract
/// `tool_schema`): tool A's output schema structurally matches tool B's
/// input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidesEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub confidence: f64,
}

/// Snapshot of the current workflow for `Predictor::predict_next` (§4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Tool/capability ids already executed in this workflow, oldest first.
    pub executed: Vec<NodeId>,
    /// Whether each entry in `executed` succeeded, same order.
    pub succeeded: Vec<bool>,
    /// Opaque context used to hash into episodic memory.
    pub context_key: String,
}

impl WorkflowState {
    /// The anchor tool/capability: the last *successful* task's node, or
    /// `None` if there isn't one (§4.9 step 1).
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.executed
            .iter()
            .zip(self.succeeded.iter())
            .rev()
            .find(|(_, ok)| **ok)
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_tracks_type_and_source_atomically() {
        let mut e = EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Inferred, 0);
        assert!((e.weight() - 0.35).abs() < 1e-9);
        e.set_type_source(EdgeType::Dependency, EdgeSource::Observed);
        assert!((e.weight() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn promotion_happens_exactly_at_threshold() {
        let mut e = EdgeAttrs::new(EdgeType::Sequence, EdgeSource::Inferred, 0);
        for _ in 0..2 {
            e.increment_count();
            assert_eq!(e.source, EdgeSource::Inferred);
        }
        e.increment_count();
        assert_eq!(e.count, 3);
        assert_eq!(e.source, EdgeSource::Observed);
        assert!((e.weight() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn user_edges_are_rank_pinned() {
        let e = EdgeAttrs::new_user(EdgeType::Alternative);
        assert!((e.weight() - 0.90).abs() < 1e-9);
    }

    #[test]
    fn anchor_picks_last_success() {
        let state = WorkflowState {
            executed: vec!["a".into(), "b".into(), "c".into()],
            succeeded: vec![true, false, true],
            context_key: "ctx".into(),
        };
        assert_eq!(state.anchor(), Some("c"));

        let state = WorkflowState {
            executed: vec!["a".into(), "b".into()],
            succeeded: vec![true, false],
            context_key: "ctx".into(),
        };
        assert_eq!(state.anchor(), Some("a"));

        let state = WorkflowState::default();
        assert_eq!(state.anchor(), None);
    }
}
