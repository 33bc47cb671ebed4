//! A minimal `SemanticSearch` adapter. A real embedding-backed ANN index
//! is explicitly out of this workspace's scope (spec.md §1 Non-goals /
//! `graphrag-core`'s `hybrid_search::SemanticSearch` doc comment); this
//! crate substitutes token-overlap scoring against node display names so
//! `suggest_plan` still has a usable candidate pool end-to-end.
//! `embedding()` always returns `None`, which routes `LocalAlpha`'s
//! active-search algorithm to its documented no-embeddings fallback
//! (α = 1.0).

use std::collections::HashSet;

use async_trait::async_trait;

use graphrag_core::error::Result;
use graphrag_core::graph::GraphStore;
use graphrag_core::hybrid_search::SemanticSearch;
use graphrag_core::types::NodeId;

pub struct TokenOverlapSearch<'a> {
    graph: &'a GraphStore,
}

impl<'a> TokenOverlapSearch<'a> {
    #[must_use]
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }
}

fn tokens(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[async_trait]
impl SemanticSearch for TokenOverlapSearch<'_> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<(NodeId, f64)>> {
        let query_tokens = tokens(query);
        let mut scored: Vec<(NodeId, f64)> = self
            .graph
            .nodes()
            .map(|n| {
                let node_tokens = tokens(&format!("{} {}", n.id, n.display_name));
                (n.id.clone(), jaccard(&query_tokens, &node_tokens))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    fn embedding(&self, _id: &str) -> Option<Vec<f64>> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use graphrag_core::types::Node;

    #[tokio::test]
    async fn scores_by_token_overlap_with_node_names() {
        let mut g = GraphStore::new();
        g.add_node(Node::tool("fs:read_file", "read file contents", "fs"));
        g.add_node(Node::tool("net:http_get", "perform an http get request", "net"));
        let search = TokenOverlapSearch::new(&g);
        let results = search.search("read a file", 5).await.unwrap();
        assert_eq!(results[0].0, "fs:read_file");
    }

    #[tokio::test]
    async fn embedding_is_always_none() {
        let g = GraphStore::new();
        let search = TokenOverlapSearch::new(&g);
        assert!(search.embedding("anything").is_none());
    }
}
