use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Result, TranscriptError};
use crate::format::FormatOptions;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::mcp::tools::{
    tool_descriptors, FormatArgs, GetMultipleArgs, GetTranscriptArgs, ListLanguagesArgs,
    TranslateArgs,
};
use crate::service::{TranscriptService, MAX_BATCH_IDS};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Routes JSON-RPC requests to the orchestrator. Transport-agnostic: both
/// the stdio and HTTP transports feed requests through [`Self::handle`].
pub struct McpServer {
    service: Arc<TranscriptService>,
}

impl McpServer {
    pub fn new(service: Arc<TranscriptService>) -> Self {
        Self { service }
    }

    /// Handle one request. Notifications return `None`.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);
        let is_notification = request.is_notification();

        debug!(method = %request.method, notification = is_notification, "rpc request");

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "notifications/initialized" => return None,
            "tools/list" => {
                JsonRpcResponse::success(id, json!({"tools": tool_descriptors()}))
            }
            "tools/call" => self.handle_tool_call(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(id, json!({"resources": []})),
            "prompts/list" => JsonRpcResponse::success(id, json!({"prompts": []})),
            "logging/setLevel" => {
                let level = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("level"))
                    .and_then(|l| l.as_str())
                    .unwrap_or("info");
                info!(level, "log level change requested");
                JsonRpcResponse::success(id, json!({}))
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        };

        if is_notification {
            None
        } else {
            Some(response)
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "tools/call requires params");
        };

        let Some(name) = params.get("name").and_then(|n| n.as_str()).map(String::from) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "tools/call requires a tool name");
        };
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let outcome = match name.as_str() {
            "get_transcript" => match decode::<GetTranscriptArgs>(arguments) {
                Ok(args) => self.call_get_transcript(args).await,
                Err(msg) => return JsonRpcResponse::error(id, INVALID_PARAMS, msg),
            },
            "get_multiple_transcripts" => match decode::<GetMultipleArgs>(arguments) {
                Ok(args) => {
                    if args.video_identifiers.is_empty()
                        || args.video_identifiers.len() > MAX_BATCH_IDS
                    {
                        return JsonRpcResponse::error(
                            id,
                            INVALID_PARAMS,
                            format!("video_identifiers must contain 1..={MAX_BATCH_IDS} entries"),
                        );
                    }
                    self.call_get_multiple(args).await
                }
                Err(msg) => return JsonRpcResponse::error(id, INVALID_PARAMS, msg),
            },
            "translate_transcript" => match decode::<TranslateArgs>(arguments) {
                Ok(args) => self.call_translate(args).await,
                Err(msg) => return JsonRpcResponse::error(id, INVALID_PARAMS, msg),
            },
            "format_transcript" => match decode::<FormatArgs>(arguments) {
                Ok(args) => self.call_format(args).await,
                Err(msg) => return JsonRpcResponse::error(id, INVALID_PARAMS, msg),
            },
            "list_available_languages" => match decode::<ListLanguagesArgs>(arguments) {
                Ok(args) => self.call_list_languages(args).await,
                Err(msg) => return JsonRpcResponse::error(id, INVALID_PARAMS, msg),
            },
            other => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("unknown tool: {other}"),
                )
            }
        };

        match outcome {
            Ok(payload) => JsonRpcResponse::success(id, tool_result(payload)),
            Err(e) => JsonRpcResponse::operation_error(id, &e),
        }
    }

    async fn call_get_transcript(&self, args: GetTranscriptArgs) -> Result<Value> {
        let transcript = self
            .service
            .get_transcript(
                &args.video_identifier,
                args.languages,
                args.preserve_formatting,
            )
            .await?;

        let mut payload = serde_json::to_value(transcript.as_ref())
            .map_err(|e| TranscriptError::Internal(e.to_string()))?;

        if args.include_timestamps {
            let timestamped = crate::format::render(
                &transcript.segments,
                crate::format::OutputFormat::PlainText,
                &FormatOptions {
                    include_timestamps: true,
                    ..Default::default()
                },
            );
            payload["word_count"] = json!(timestamped.split_whitespace().count());
            payload["char_count"] = json!(timestamped.chars().count());
            payload["formatted_text"] = Value::String(timestamped);
        }
        if !args.include_metadata {
            if let Some(o) = payload.as_object_mut() {
                o.remove("metadata");
            }
        }
        Ok(payload)
    }

    async fn call_get_multiple(&self, args: GetMultipleArgs) -> Result<Value> {
        let batch = Arc::clone(&self.service)
            .get_multiple_transcripts(
                args.video_identifiers,
                args.languages,
                args.continue_on_error,
                args.parallel,
            )
            .await?;

        let mut payload = serde_json::to_value(&batch)
            .map_err(|e| TranscriptError::Internal(e.to_string()))?;

        if !args.include_metadata {
            if let Some(results) = payload.get_mut("results").and_then(|r| r.as_array_mut()) {
                for item in results {
                    if let Some(t) = item.get_mut("transcript").and_then(|t| t.as_object_mut()) {
                        t.remove("metadata");
                    }
                }
            }
        }
        Ok(payload)
    }

    async fn call_translate(&self, args: TranslateArgs) -> Result<Value> {
        let transcript = self
            .service
            .translate_transcript(
                &args.video_identifier,
                &args.target_language,
                args.source_language,
            )
            .await?;

        let mut payload = serde_json::to_value(transcript.as_ref())
            .map_err(|e| TranscriptError::Internal(e.to_string()))?;
        payload["requested_language"] = Value::String(args.target_language);
        if !args.preserve_timestamps {
            // Callers that only want text can skip the per-segment timing.
            if let Some(segments) = payload.get_mut("segments").and_then(|s| s.as_array_mut()) {
                for segment in segments {
                    if let Some(o) = segment.as_object_mut() {
                        o.remove("start");
                        o.remove("duration");
                        o.remove("end");
                    }
                }
            }
        }
        Ok(payload)
    }

    async fn call_format(&self, args: FormatArgs) -> Result<Value> {
        let opts = FormatOptions {
            include_timestamps: args.include_timestamps,
            timestamp_style: args.timestamp_format,
            max_line_length: args.max_line_length,
        };
        let (transcript, rendered) = self
            .service
            .format_transcript(&args.video_identifier, args.format_type, opts)
            .await?;

        Ok(json!({
            "video_id": transcript.video_id,
            "language": transcript.language,
            "format": args.format_type,
            "text": rendered,
            "segment_count": transcript.segments.len(),
            "duration_seconds": transcript.duration_seconds,
        }))
    }

    async fn call_list_languages(&self, args: ListLanguagesArgs) -> Result<Value> {
        let languages = self
            .service
            .list_languages(&args.video_identifier, args.include_auto)
            .await?;

        Ok(json!({
            "video_id": crate::video_id::resolve(&args.video_identifier)?,
            "languages": languages.as_ref(),
            "total": languages.len(),
        }))
    }
}

/// Wrap a tool payload in the MCP content envelope.
fn tool_result(payload: Value) -> Value {
    let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": false,
    })
}

fn decode<T: serde::de::DeserializeOwned>(arguments: Value) -> std::result::Result<T, String> {
    serde_json::from_value(arguments).map_err(|e| format!("invalid arguments: {e}"))
}
