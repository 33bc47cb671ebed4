//! `graphrag-mcp`: a Model Context Protocol server exposing the
//! GraphRAG planning engine (`graphrag-core`) over JSON-RPC, backed by
//! `graphrag-store` for persistence.
//!
//! Module map:
//! - [`jsonrpc`] — wire types and stdio framing (newline or LSP-style).
//! - [`protocol`] — `initialize`/`tools/list` handlers and tool schemas.
//! - [`dispatch`] — routes a decoded line to a handler or the sampling
//!   reply resolver.
//! - [`server`] — [`PlannerMcpServer`], owning the graph and dispatching
//!   `tools/call`.
//! - [`sampling`] — outbound `sampling/createMessage` with a pending
//!   table and a 5-minute timeout.
//! - [`limiter`] — bounded in-flight request limiter.
//! - [`semantic`] — the in-process `SemanticSearch` stand-in.
//! - [`error`] — this crate's `Result`/`Error`.

pub mod dispatch;
pub mod error;
pub mod jsonrpc;
pub mod limiter;
pub mod protocol;
pub mod sampling;
pub mod semantic;
pub mod server;

pub use error::{Error, Result};
pub use server::PlannerMcpServer;
