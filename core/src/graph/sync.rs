//! `Sync` and `PersistEdges` (§4.1): the boundary between the in-memory
//! graph and the relational store.

use tracing::{info, warn};

use crate::constants::SYNC_CONFIDENCE_FILTER;
use crate::error::Result;
use crate::types::EdgeAttrs;

use super::repository::GraphRepository;
use super::GraphStore;

impl GraphStore {
    /// Clear the graph and reload it from the repository: tool nodes, then
    /// dependency rows filtered at `confidence_score >= 0.3`, then
    /// capability dependency rows (auto-creating capability nodes on
    /// demand). A DB error here is fatal to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::DbUnavailable`] if the repository
    /// cannot be reached.
    pub async fn sync(&mut self, repo: &dyn GraphRepository) -> Result<()> {
        self.clear();

        let tools = repo
            .list_tools()
            .await
            .map_err(|e| crate::error::Error::DbUnavailable(e.to_string()))?;
        let tool_count = tools.len();
        for tool in tools {
            self.add_node(tool);
        }

        let deps = repo
            .list_tool_dependencies(SYNC_CONFIDENCE_FILTER)
            .await
            .map_err(|e| crate::error::Error::DbUnavailable(e.to_string()))?;
        let mut edge_count = 0usize;
        for row in deps {
            let mut attrs = EdgeAttrs::new(row.edge_type, row.edge_source, row.observed_count);
            attrs.last_observed = row.last_observed;
            if let Err(err) = self.add_edge(&row.from, &row.to, attrs) {
                warn!(from = %row.from, to = %row.to, error = %err, "skipping inconsistent dependency row");
                continue;
            }
            edge_count += 1;
        }

        let cap_deps = repo
            .list_capability_dependencies(SYNC_CONFIDENCE_FILTER)
            .await
            .map_err(|e| crate::error::Error::DbUnavailable(e.to_string()))?;
        for row in cap_deps {
            let attrs = EdgeAttrs::new(row.edge_type, row.edge_source, row.observed_count);
            if let Err(err) = self.add_edge(&row.from, &row.to, attrs) {
                warn!(from = %row.from, to = %row.to, error = %err, "skipping inconsistent capability dependency row");
                continue;
            }
            edge_count += 1;
        }

        info!(
            tool_count,
            edge_count,
            node_count = self.node_count(),
            "graph.synced"
        );
        Ok(())
    }

    /// Upsert every non-capability edge to the persistent store with its
    /// current `(count, weight, type, source)`. Individual upsert failures
    /// are logged and skipped — the in-memory graph remains the source of
    /// truth until the next `sync`.
    pub async fn persist_edges(&self, repo: &dyn GraphRepository) {
        use super::repository::DependencyRow;

        for (from, to, attrs) in self.edges() {
            if crate::types::Node::is_capability_id(from) || crate::types::Node::is_capability_id(to) {
                let row = super::repository::CapabilityDependencyRow {
                    from: from.clone(),
                    to: to.clone(),
                    observed_count: attrs.count,
                    confidence_score: attrs.weight(),
                    edge_type: attrs.edge_type,
                    edge_source: attrs.source,
                };
                if let Err(err) = repo.upsert_capability_dependency(&row).await {
                    warn!(from = %from, to = %to, error = %err, "persistence.skip");
                }
                continue;
            }

            let row = DependencyRow {
                from: from.clone(),
                to: to.clone(),
                observed_count: attrs.count,
                confidence_score: attrs.weight(),
                edge_type: attrs.edge_type,
                edge_source: attrs.source,
                last_observed: attrs.last_observed,
            };
            if let Err(err) = repo.upsert_tool_dependency(&row).await {
                warn!(from = %from, to = %to, error = %err, "persistence.skip");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::types::{EdgeSource, EdgeType, Node};

    use super::super::repository::{CapabilityDependencyRow, DependencyRow, GraphRepository};
    use super::*;

    #[derive(Default)]
    struct FakeRepo {
        tools: Vec<Node>,
        deps: Vec<DependencyRow>,
        cap_deps: Vec<CapabilityDependencyRow>,
        upserted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl GraphRepository for FakeRepo {
        async fn list_tools(&self) -> Result<Vec<Node>> {
            Ok(self.tools.clone())
        }
        async fn list_tool_dependencies(&self, min_confidence: f64) -> Result<Vec<DependencyRow>> {
            Ok(self
                .deps
                .iter()
                .filter(|d| d.confidence_score >= min_confidence)
                .cloned()
                .collect())
        }
        async fn list_capability_dependencies(
            &self,
            min_confidence: f64,
        ) -> Result<Vec<CapabilityDependencyRow>> {
            Ok(self
                .cap_deps
                .iter()
                .filter(|d| d.confidence_score >= min_confidence)
                .cloned()
                .collect())
        }
        async fn upsert_tool_dependency(&self, row: &DependencyRow) -> Result<()> {
            self.upserted
                .lock()
                .unwrap()
                .push((row.from.clone(), row.to.clone()));
            Ok(())
        }
        async fn upsert_capability_dependency(&self, _row: &CapabilityDependencyRow) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn sync_filters_by_confidence() {
        let repo = FakeRepo {
            tools: vec![Node::tool("a", "A", "srv"), Node::tool("b", "B", "srv")],
            deps: vec![
                DependencyRow {
                    from: "a".into(),
                    to: "b".into(),
                    observed_count: 1,
                    confidence_score: 0.9,
                    edge_type: EdgeType::Dependency,
                    edge_source: EdgeSource::Observed,
                    last_observed: None,
                },
                DependencyRow {
                    from: "b".into(),
                    to: "a".into(),
                    observed_count: 1,
                    confidence_score: 0.1,
                    edge_type: EdgeType::Sequence,
                    edge_source: EdgeSource::Template,
                    last_observed: None,
                },
            ],
            ..Default::default()
        };

        let mut g = GraphStore::new();
        g.sync(&repo).await.unwrap();
        assert!(g.has_edge("a", "b"));
        assert!(!g.has_edge("b", "a"));
    }

    #[tokio::test]
    async fn persist_then_sync_round_trips_modulo_filter() {
        let repo = FakeRepo {
            tools: vec![Node::tool("a", "A", "srv"), Node::tool("b", "B", "srv")],
            deps: vec![DependencyRow {
                from: "a".into(),
                to: "b".into(),
                observed_count: 2,
                confidence_score: 0.5,
                edge_type: EdgeType::Dependency,
                edge_source: EdgeSource::Observed,
                last_observed: None,
            }],
            ..Default::default()
        };

        let mut g = GraphStore::new();
        g.sync(&repo).await.unwrap();
        g.persist_edges(&repo).await;
        assert_eq!(repo.upserted.lock().unwrap().len(), 1);

        let mut g2 = GraphStore::new();
        g2.sync(&repo).await.unwrap();
        assert_eq!(g.edge_count(), g2.edge_count());
    }
}
