//! The relational-store read/write port that `GraphStore::sync` and
//! `GraphStore::persist_edges` consume (spec.md §6 "DB contract"). Database
//! mechanics are out of scope for this crate; `graphrag-store` provides a
//! libSQL-backed implementation of this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{EdgeSource, EdgeType, Node, NodeId};

/// A row from `tool_dependency`.
#[derive(Debug, Clone)]
pub struct DependencyRow {
    pub from: NodeId,
    pub to: NodeId,
    pub observed_count: u64,
    pub confidence_score: f64,
    pub edge_type: EdgeType,
    pub edge_source: EdgeSource,
    pub last_observed: Option<DateTime<Utc>>,
}

/// A row from `capability_dependency`.
#[derive(Debug, Clone)]
pub struct CapabilityDependencyRow {
    pub from: NodeId,
    pub to: NodeId,
    pub observed_count: u64,
    pub confidence_score: f64,
    pub edge_type: EdgeType,
    pub edge_source: EdgeSource,
}

/// Read/write port onto the relational store backing the knowledge graph.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// All tool nodes, from `tool_embedding`.
    async fn list_tools(&self) -> Result<Vec<Node>>;

    /// Dependency rows with `confidence_score` at or above `min_confidence`.
    async fn list_tool_dependencies(&self, min_confidence: f64) -> Result<Vec<DependencyRow>>;

    /// Capability-to-capability dependency rows, same filter.
    async fn list_capability_dependencies(
        &self,
        min_confidence: f64,
    ) -> Result<Vec<CapabilityDependencyRow>>;

    /// Upsert a single non-capability edge with its current
    /// `(count, weight, type, source)`.
    async fn upsert_tool_dependency(&self, row: &DependencyRow) -> Result<()>;

    /// Upsert a capability-to-capability edge. Implementations must apply
    /// the inferred -> observed promotion transactionally and warn (not
    /// fail) on detected `contains` cycles.
    async fn upsert_capability_dependency(&self, row: &CapabilityDependencyRow) -> Result<()>;
}
