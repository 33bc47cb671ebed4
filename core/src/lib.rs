//! `graphrag-core`: the adaptive workflow planning engine.
//!
//! This crate holds the domain logic of the planner — the in-memory
//! knowledge graph, its derived metrics, the locally adaptive blending
//! algorithms, the DAG builder, and the two request-serving facades
//! (`Suggester` and `Predictor`) plus the passive `LearningLoop` that
//! keeps the graph current from execution traces. It has no knowledge of
//! transport (JSON-RPC) or storage mechanics (SQL) — those live in
//! `graphrag-mcp` and `graphrag-store` respectively, talking to this
//! crate through the [`graph::GraphRepository`] port and the plain data
//! types in [`types`].
//!
//! Module map:
//! - [`error`] — the shared `Result`/`Error` used across the crate.
//! - [`constants`] — the edge-weight algebra and other fixed numbers.
//! - [`types`] — the data model (nodes, edges, tasks, results).
//! - [`config`] — YAML-loaded tunables for the DAG scorer and `LocalAlpha`.
//! - [`graph`] — `GraphStore`, the in-memory multigraph and its DB sync.
//! - [`metrics`] — PageRank, Louvain communities, density.
//! - [`spectral`] — bipartite spectral clustering over tool/capability edges.
//! - [`local_alpha`] — the four per-node blending-coefficient algorithms.
//! - [`hybrid_search`] — semantic x graph blended search.
//! - [`dag`] — shortest-path DAG construction and validation.
//! - [`episodic`] — episodic-memory confidence adjustment, shared by
//!   capability injection and the predictor.
//! - [`suggester`] — `Suggest`, the main planning entry point.
//! - [`predictor`] — `PredictNext`, passive next-step prediction.
//! - [`learning`] — execution-trace ingestion and graph updates.

pub mod config;
pub mod constants;
pub mod dag;
pub mod episodic;
pub mod error;
pub mod graph;
pub mod hybrid_search;
pub mod learning;
pub mod local_alpha;
pub mod metrics;
pub mod predictor;
pub mod spectral;
pub mod suggester;
pub mod types;

pub use error::{Error, Result};
pub use graph::GraphStore;
pub use metrics::Metrics;
