//! JSON-RPC 2.0 endpoint speaking the MCP tool protocol.
//!
//! Memory storage and search tools are served by the memory backend; this
//! endpoint answers the lifecycle methods and the identity tool so that
//! clients can check which user their credential resolves to.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::web::session::AuthUser;

pub const SERVER_NAME: &str = "LoopMemory";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_INITIALIZE: &str = "initialize";
const METHOD_PING: &str = "ping";
const METHOD_TOOLS_LIST: &str = "tools/list";
const METHOD_TOOLS_CALL: &str = "tools/call";

const TOOL_WHO_AM_I: &str = "whoAmI";

// JSON-RPC 2.0 error codes
const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
}

/// POST /api/mcp
pub async fn rpc(user: AuthUser, body: Result<Json<JsonRpcRequest>, JsonRejection>) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable json-rpc body");
            return Json(JsonRpcResponse::err(Value::Null, RpcError::new(PARSE_ERROR, "Parse error"))).into_response();
        }
    };

    let Some(id) = req.id.filter(|id| !id.is_null()) else {
        // notifications (e.g. notifications/initialized) get no body
        return StatusCode::ACCEPTED.into_response();
    };

    if req.jsonrpc.as_deref() != Some("2.0") {
        return Json(JsonRpcResponse::err(id, RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""))).into_response();
    }
    let Some(method) = req.method else {
        return Json(JsonRpcResponse::err(id, RpcError::new(INVALID_REQUEST, "missing method"))).into_response();
    };

    tracing::debug!(user_id = %user.user_id, method = %method, "mcp request");
    let response = match dispatch(&method, req.params, &user) {
        Ok(result) => JsonRpcResponse::ok(id, result),
        Err(error) => JsonRpcResponse::err(id, error),
    };
    Json(response).into_response()
}

fn dispatch(method: &str, params: Option<Value>, user: &AuthUser) -> Result<Value, RpcError> {
    match method {
        METHOD_INITIALIZE => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        })),
        METHOD_PING => Ok(json!({})),
        METHOD_TOOLS_LIST => Ok(json!({ "tools": tool_definitions() })),
        METHOD_TOOLS_CALL => {
            let params: ToolCallParams = params
                .ok_or_else(|| RpcError::new(INVALID_PARAMS, "missing params"))
                .and_then(|p| serde_json::from_value(p).map_err(|e| RpcError::new(INVALID_PARAMS, e.to_string())))?;
            call_tool(&params.name, user)
        }
        other => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
    }
}

fn call_tool(name: &str, user: &AuthUser) -> Result<Value, RpcError> {
    match name {
        TOOL_WHO_AM_I => {
            let who = json!({ "id": user.user_id, "email": user.email });
            let text = serde_json::to_string_pretty(&who).unwrap_or_else(|_| who.to_string());
            Ok(json!({ "content": [ { "type": "text", "text": text } ] }))
        }
        other => Err(RpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", other))),
    }
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": TOOL_WHO_AM_I,
            "description": "Get information about the current user",
            "inputSchema": { "type": "object", "properties": {} },
        }
    ])
}

/// GET /.well-known/mcp.json
pub async fn discovery() -> impl IntoResponse {
    Json(json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Universal memory layer for AI assistants",
        "capabilities": { "tools": true },
    }))
}
