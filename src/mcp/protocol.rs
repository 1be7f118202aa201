use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TranscriptError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Typed operation failures; the error kind travels in `data.type`.
pub const OPERATION_ERROR: i64 = -32000;

/// A JSON-RPC 2.0 request. `id` is absent for notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Map a typed operation failure onto the `-32000` envelope with the
    /// kind, video id and suggestions in `data`.
    pub fn operation_error(id: Value, error: &TranscriptError) -> Self {
        let mut data = serde_json::Map::new();
        data.insert("type".into(), Value::String(error.kind().as_str().into()));
        if let Some(video_id) = error.video_id() {
            data.insert("video_id".into(), Value::String(video_id.into()));
        }
        if let Some(suggestions) = error.suggestions() {
            data.insert(
                "suggestions".into(),
                Value::Array(
                    suggestions
                        .iter()
                        .map(|s| Value::String(s.clone()))
                        .collect(),
                ),
            );
        }
        if let Some(retry_after) = error.retry_after() {
            data.insert("retry_after".into(), Value::Number(retry_after.into()));
        }

        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code: OPERATION_ERROR,
                message: error.to_string(),
                data: Some(Value::Object(data)),
            }),
        }
    }

    /// Response to an unparseable line: no id to echo, code -32700.
    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::error(Value::Null, PARSE_ERROR, format!("parse error: {detail}"))
    }
}
