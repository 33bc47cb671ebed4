//! C10: `LearningLoop` — ingests execution traces and keeps the graph
//! current (spec.md §4.10).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::graph::{GraphRepository, GraphStore};
use crate::metrics::Metrics;
use crate::types::{EdgeSource, EdgeType, SuggestedDag};

/// One code-execution trace (§4.10 `UpdateFromCodeExecution`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionTrace {
    pub trace_id: String,
    pub parent_trace_id: Option<String>,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
}

/// `UpdateFromExecution(dag, success, timing)`: re-weights the explicit
/// `dependsOn` edges of a completed DAG, persists, and re-triggers
/// metrics if anything changed.
///
/// # Errors
///
/// Returns an error if the repository cannot be reached while
/// persisting edges.
pub async fn update_from_execution(graph: &mut GraphStore, repo: &dyn GraphRepository, dag: &SuggestedDag, _success: bool) -> Result<Option<Metrics>> {
    let mut changed = false;

    for task in &dag.tasks {
        for dep_task_id in &task.depends_on {
            let Some(from_task) = dag.tasks.iter().find(|t| &t.task_id == dep_task_id) else {
                continue;
            };
            if from_task.node_id == task.node_id {
                continue;
            }

            if let Some(attrs) = graph.edge_mut(&from_task.node_id, &task.node_id) {
                // Weight is a pure function of (type, source), so the "lift
                // weight by 1.1, cap 1.0" the spec describes is realized as
                // an extra observation toward inferred->observed promotion
                // rather than a direct weight mutation.
                attrs.increment_count();
            } else {
                let attrs = crate::types::EdgeAttrs::new(EdgeType::Dependency, EdgeSource::Template, 1);
                graph.add_edge(&from_task.node_id, &task.node_id, attrs)?;
            }
            changed = true;
        }
    }

    if changed {
        graph.persist_edges(repo).await;
        Ok(Some(Metrics::compute(graph)))
    } else {
        Ok(None)
    }
}

/// `UpdateFromCodeExecution(traces)`: builds `contains` edges parent→child
/// and `sequence` edges between consecutive siblings (or consecutive
/// top-level traces when no parent exists), via
/// [`GraphStore::bump_edge_count`] so inferred→observed promotion and
/// weight recomputation stay consistent.
///
/// # Errors
///
/// Returns an error if a `contains` edge would form a self-loop.
pub fn update_from_code_execution(graph: &mut GraphStore, traces: &[ExecutionTrace]) -> Result<bool> {
    if traces.is_empty() {
        return Ok(false);
    }

    let mut children_by_parent: HashMap<&str, Vec<&ExecutionTrace>> = HashMap::new();
    let mut top_level: Vec<&ExecutionTrace> = Vec::new();
    for trace in traces {
        if let Some(parent) = &trace.parent_trace_id {
            children_by_parent.entry(parent.as_str()).or_default().push(trace);
        } else {
            top_level.push(trace);
        }
    }

    let by_trace_id: HashMap<&str, &ExecutionTrace> = traces.iter().map(|t| (t.trace_id.as_str(), t)).collect();
    let mut changed = false;

    for (parent_id, mut children) in children_by_parent {
        children.sort_by_key(|t| t.timestamp);
        if let Some(parent) = by_trace_id.get(parent_id) {
            for child in &children {
                if parent.node_id != child.node_id {
                    graph.bump_edge_count(&parent.node_id, &child.node_id, EdgeType::Contains, EdgeSource::Inferred)?;
                    changed = true;
                }
            }
        }
        for pair in children.windows(2) {
            if pair[0].node_id != pair[1].node_id {
                graph.bump_edge_count(&pair[0].node_id, &pair[1].node_id, EdgeType::Sequence, EdgeSource::Inferred)?;
                changed = true;
            }
        }
    }

    top_level.sort_by_key(|t| t.timestamp);
    for pair in top_level.windows(2) {
        if pair[0].node_id != pair[1].node_id {
            graph.bump_edge_count(&pair[0].node_id, &pair[1].node_id, EdgeType::Sequence, EdgeSource::Inferred)?;
            changed = true;
        }
    }

    Ok(changed)
}
