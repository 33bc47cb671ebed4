//! Routes one decoded JSON-RPC line to either the sampling-reply
//! resolver (if it's a response to our own outbound request) or a
//! protocol/tool-call handler (if it's an inbound request).

use serde_json::Value;

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::protocol;
use crate::server::PlannerMcpServer;

/// Handle one decoded message. Returns `None` for notifications and for
/// replies to our own outbound sampling requests (nothing to send back).
pub async fn handle_message(server: &PlannerMcpServer, raw: &str) -> Option<JsonRpcResponse> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Some(JsonRpcResponse::failure(None, -32700, format!("parse error: {e}"))),
    };

    // A line with no "method" is a reply to one of our own outbound
    // sampling/createMessage requests, not an inbound request.
    if value.get("method").is_none() {
        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            server.sampling.resolve(id, result);
        }
        return None;
    }

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => return Some(JsonRpcResponse::failure(None, -32600, format!("invalid request: {e}"))),
    };

    match request.method.as_str() {
        "initialize" => protocol::handle_initialize(&request),
        "initialized" | "notifications/initialized" => None,
        "ping" => request.id.clone().map(|id| JsonRpcResponse::success(Some(id), serde_json::json!({}))),
        "tools/list" => Some(protocol::handle_list_tools(&request)),
        "tools/call" => Some(handle_tools_call(server, request).await),
        other => request
            .id
            .clone()
            .map(|id| JsonRpcResponse::failure(Some(id), -32601, format!("method not found: {other}"))),
    }
}

async fn handle_tools_call(server: &PlannerMcpServer, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    let params = request.params.unwrap_or(Value::Null);
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match server.call_tool(&name, arguments).await {
        Ok(result) => JsonRpcResponse::success(id, serde_json::json!({ "content": [{ "type": "text", "text": result.to_string() }] })),
        Err(e) => JsonRpcResponse::failure(id, e.code(), e.to_string()),
    }
}
