//! End-to-end exercise of the JSON-RPC dispatch loop: `initialize`,
//! `tools/list`, and a `tools/call` round trip against an in-memory
//! database.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::Arc;

use graphrag_core::config::{DagScoringConfig, LocalAlphaConfig};
use graphrag_mcp::{dispatch, PlannerMcpServer};
use graphrag_store::{connect, GraphStoreDb, StoreConfig};
use parking_lot::Mutex;
use serde_json::json;

async fn seeded_server() -> PlannerMcpServer {
    let db = connect(&StoreConfig::new(":memory:", None)).await.expect("connect");
    let conn = db.connect().expect("connect handle");
    conn.execute(
        "INSERT INTO tool_embedding (tool_id, server_id, tool_name, metadata) VALUES (?1, ?2, ?3, ?4)",
        libsql::params!["fs:read_file", "fs", "read file contents", "{}"],
    )
    .await
    .expect("seed tool 1");
    conn.execute(
        "INSERT INTO tool_embedding (tool_id, server_id, tool_name, metadata) VALUES (?1, ?2, ?3, ?4)",
        libsql::params!["fs:write_file", "fs", "write file contents", "{}"],
    )
    .await
    .expect("seed tool 2");
    conn.execute(
        "INSERT INTO tool_dependency (from_tool_id, to_tool_id, observed_count, confidence_score, edge_type, edge_source, last_observed) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        libsql::params!["fs:read_file", "fs:write_file", 3_i64, 0.5_f64, "sequence", "observed", Option::<i64>::None],
    )
    .await
    .expect("seed dependency");

    let repo = GraphStoreDb::new(&db).expect("repo");
    let stdout: Arc<Mutex<dyn Write + Send>> = Arc::new(Mutex::new(Vec::new()));
    PlannerMcpServer::new(repo, DagScoringConfig::default(), LocalAlphaConfig::default(), stdout)
        .await
        .expect("server")
}

#[tokio::test]
async fn initialize_then_list_tools_then_call_suggest_plan() {
    let server = seeded_server().await;

    let init = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2025-11-25"}});
    let response = dispatch::handle_message(&server, &init.to_string()).await.unwrap();
    assert_eq!(response.result.unwrap()["protocolVersion"], "2025-11-25");

    let notif = json!({"jsonrpc": "2.0", "method": "initialized"});
    assert!(dispatch::handle_message(&server, &notif.to_string()).await.is_none());

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let response = dispatch::handle_message(&server, &list.to_string()).await.unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 4);

    let call = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": { "name": "suggest_plan", "arguments": { "intent": "read a file", "context_tools": [] } }
    });
    let response = dispatch::handle_message(&server, &call.to_string()).await.unwrap();
    assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
    assert!(response.result.is_some());
}

#[tokio::test]
async fn unknown_tool_name_yields_a_jsonrpc_error() {
    let server = seeded_server().await;
    let call = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": { "name": "does_not_exist", "arguments": {} }
    });
    let response = dispatch::handle_message(&server, &call.to_string()).await.unwrap();
    let error = response.error.expect("expected an error response");
    assert_eq!(error.code, -32601);
}

#[tokio::test]
async fn ping_notification_without_id_gets_no_response() {
    let server = seeded_server().await;
    let ping = json!({"jsonrpc": "2.0", "method": "ping"});
    assert!(dispatch::handle_message(&server, &ping.to_string()).await.is_none());
}

#[tokio::test]
async fn malformed_json_yields_a_parse_error_response() {
    let server = seeded_server().await;
    let response = dispatch::handle_message(&server, "{not json").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32700);
}
