//! The planning server: owns the in-memory graph, the derived metrics,
//! and the request handlers dispatched from `tools/call`.

use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::{json, Value};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use graphrag_core::config::{DagScoringConfig, LocalAlphaConfig};
use graphrag_core::graph::GraphStore;
use graphrag_core::learning::{self, ExecutionTrace};
use graphrag_core::local_alpha::LocalAlpha;
use graphrag_core::metrics::Metrics;
use graphrag_core::predictor::Predictor;
use graphrag_core::suggester::Suggester;
use graphrag_core::types::{EpisodicContext, SuggestedDag, WorkflowState};
use graphrag_store::GraphStoreDb;

use crate::error::{Error, Result};
use crate::limiter::InFlightLimiter;
use crate::sampling::SamplingClient;
use crate::semantic::TokenOverlapSearch;

/// Owns the adaptive planning engine's mutable state and dispatches tool
/// calls into it. Every field uses a `tokio::sync` lock, never a sync
/// one, since `Suggester`/`Predictor` hold the guards across `.await`
/// points internally.
pub struct PlannerMcpServer {
    graph: RwLock<GraphStore>,
    metrics: RwLock<Metrics>,
    local_alpha: AsyncMutex<LocalAlpha>,
    suggester: AsyncMutex<Suggester>,
    predictor: AsyncMutex<Predictor>,
    repo: GraphStoreDb,
    pub limiter: InFlightLimiter,
    pub sampling: Arc<SamplingClient>,
}

impl PlannerMcpServer {
    /// Connects to the store, loads the graph, and computes initial
    /// metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial sync against `repo` fails.
    pub async fn new(repo: GraphStoreDb, dag_config: DagScoringConfig, alpha_config: LocalAlphaConfig, outbound: Arc<SyncMutex<dyn std::io::Write + Send>>) -> Result<Self> {
        let mut graph = GraphStore::new();
        graph.sync(&repo).await?;
        let metrics = Metrics::compute(&graph);

        Ok(Self {
            graph: RwLock::new(graph),
            metrics: RwLock::new(metrics),
            local_alpha: AsyncMutex::new(LocalAlpha::new(alpha_config)),
            suggester: AsyncMutex::new(Suggester::new(dag_config.clone())),
            predictor: AsyncMutex::new(Predictor::new(dag_config)),
            repo,
            limiter: InFlightLimiter::default(),
            sampling: Arc::new(SamplingClient::new(outbound)),
        })
    }

    /// Dispatch a `tools/call` request by tool name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MethodNotFound`] for an unknown tool name,
    /// [`Error::InvalidParams`] for malformed arguments, or a propagated
    /// [`graphrag_core::Error`] from the underlying planning call.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let _permit = self.limiter.acquire().await;
        match name {
            "suggest_plan" => self.suggest_plan(arguments).await,
            "predict_next" => self.predict_next(arguments).await,
            "record_execution" => self.record_execution(arguments).await,
            "record_code_execution" => self.record_code_execution(arguments).await,
            other => Err(Error::MethodNotFound(other.to_string())),
        }
    }

    async fn suggest_plan(&self, arguments: Value) -> Result<Value> {
        let intent = arguments
            .get("intent")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidParams("missing `intent`".to_string()))?
            .to_string();
        let context_tools: Vec<String> = arguments
            .get("context_tools")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let graph = self.graph.read().await;
        let metrics = self.metrics.read().await;
        let semantic = TokenOverlapSearch::new(&graph);
        let mut local_alpha = self.local_alpha.lock().await;
        let mut suggester = self.suggester.lock().await;

        let plan = suggester
            .suggest(
                &graph,
                &metrics,
                &mut local_alpha,
                &semantic,
                &self.repo,
                &intent,
                &context_tools,
                &std::collections::HashMap::new(),
                &EpisodicContext::new(),
            )
            .await?;

        Ok(json!({ "plan": plan }))
    }

    async fn predict_next(&self, arguments: Value) -> Result<Value> {
        let workflow: WorkflowState =
            serde_json::from_value(arguments).map_err(|e| Error::InvalidParams(e.to_string()))?;

        let graph = self.graph.read().await;
        let metrics = self.metrics.read().await;
        let mut local_alpha = self.local_alpha.lock().await;
        let mut predictor = self.predictor.lock().await;

        let predictions = predictor
            .predict_next(
                &graph,
                &metrics,
                &mut local_alpha,
                &self.repo,
                &workflow,
                &std::collections::HashMap::new(),
                &EpisodicContext::new(),
            )
            .await;

        Ok(json!({ "predictions": predictions }))
    }

    async fn record_execution(&self, arguments: Value) -> Result<Value> {
        let dag: SuggestedDag = serde_json::from_value(
            arguments
                .get("dag")
                .cloned()
                .ok_or_else(|| Error::InvalidParams("missing `dag`".to_string()))?,
        )
        .map_err(|e| Error::InvalidParams(e.to_string()))?;
        let success = arguments.get("success").and_then(Value::as_bool).unwrap_or(false);

        let mut graph = self.graph.write().await;
        let updated = learning::update_from_execution(&mut graph, &self.repo, &dag, success).await?;
        if let Some(new_metrics) = updated {
            *self.metrics.write().await = new_metrics;
        }
        Ok(json!({ "recorded": true }))
    }

    async fn record_code_execution(&self, arguments: Value) -> Result<Value> {
        let traces: Vec<ExecutionTrace> = serde_json::from_value(
            arguments
                .get("traces")
                .cloned()
                .ok_or_else(|| Error::InvalidParams("missing `traces`".to_string()))?,
        )
        .map_err(|e| Error::InvalidParams(e.to_string()))?;

        let mut graph = self.graph.write().await;
        let changed = learning::update_from_code_execution(&mut graph, &traces)?;
        if changed {
            *self.metrics.write().await = Metrics::compute(&graph);
        }
        Ok(json!({ "recorded": true, "changed": changed }))
    }
}
