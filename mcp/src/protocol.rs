//! Core MCP protocol handlers: `initialize`, `tools/list`, and the
//! `McpTool` schema declarations for the four planning tools this server
//! exposes.

use serde::Serialize;
use serde_json::{json, Value};

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Supported MCP protocol versions, latest first.
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-11-25", "2024-11-05"];

#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Value,
    #[serde(rename = "serverInfo")]
    pub server_info: Value,
}

#[derive(Debug, Serialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<McpTool>,
}

/// Handle `initialize`. Notifications (no `id`) get no response.
pub fn handle_initialize(request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    request.id.as_ref()?;

    let requested = request
        .params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    let protocol_version = requested
        .filter(|v| SUPPORTED_VERSIONS.contains(v))
        .map_or_else(|| SUPPORTED_VERSIONS[0].to_string(), ToString::to_string);

    tracing::info!(%protocol_version, "protocol.negotiated");

    let result = InitializeResult {
        protocol_version,
        capabilities: json!({
            "tools": { "listChanged": false },
            "sampling": {},
        }),
        server_info: json!({
            "name": "graphrag-mcp",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    };

    Some(JsonRpcResponse::success(request.id.clone(), serde_json::to_value(result).unwrap_or(Value::Null)))
}

/// Handle `tools/list`.
pub fn handle_list_tools(request: &JsonRpcRequest) -> JsonRpcResponse {
    let result = ListToolsResult { tools: tool_catalog() };
    JsonRpcResponse::success(request.id.clone(), serde_json::to_value(result).unwrap_or(Value::Null))
}

fn tool_catalog() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "suggest_plan".to_string(),
            description: "Suggest a ranked DAG of tasks for an intent, blending semantic search with the tool/capability graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "intent": { "type": "string" },
                    "context_tools": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["intent"]
            }),
        },
        McpTool {
            name: "predict_next".to_string(),
            description: "Predict the next likely tools or capabilities given the current workflow state".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "executed": { "type": "array", "items": { "type": "string" } },
                    "succeeded": { "type": "array", "items": { "type": "boolean" } },
                    "context_key": { "type": "string" }
                },
                "required": ["executed", "succeeded", "context_key"]
            }),
        },
        McpTool {
            name: "record_execution".to_string(),
            description: "Record the outcome of a suggested DAG's execution so its edge weights adapt".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "dag": { "type": "object" },
                    "success": { "type": "boolean" }
                },
                "required": ["dag", "success"]
            }),
        },
        McpTool {
            name: "record_code_execution".to_string(),
            description: "Record a batch of code-execution traces, deriving contains/sequence edges".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "traces": { "type": "array", "items": { "type": "object" } }
                },
                "required": ["traces"]
            }),
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn notifications_get_no_initialize_response() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "initialize".to_string(),
            params: None,
        };
        assert!(handle_initialize(&request).is_none());
    }

    #[test]
    fn unsupported_version_falls_back_to_latest() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "initialize".to_string(),
            params: Some(json!({"protocolVersion": "1999-01-01"})),
        };
        let response = handle_initialize(&request).unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], SUPPORTED_VERSIONS[0]);
    }

    #[test]
    fn lists_all_four_planning_tools() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "tools/list".to_string(),
            params: None,
        };
        let response = handle_list_tools(&request);
        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);
    }
}
