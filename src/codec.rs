//! Decoding frames into messages and encoding responses into frames.
//!
//! A frame is one line of the newline-delimited stream (see [`crate::wire`]).
//! Each frame must hold exactly one JSON-RPC 2.0 message. Responses are
//! encoded as compact single-line JSON, so the encoder can never produce a
//! frame the decoder would split.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorDescriptor, ErrorKind};
use crate::jrpc::{self, Notification, Request, Response};
use crate::mcp::dispatch::{InvocationRequest, InvocationResult};
use crate::mcp::tools::ToolOutput;

/// A successfully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(Request),
    Notification(Notification),
}

/// A frame that could not be turned into a message.
///
/// Carries the best-effort recovered `id` so the failure response can still
/// be correlated; [`Value::Null`] is the sentinel when no usable `id` exists.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {source}")]
    Syntax {
        id: Value,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    Oversized { length: usize, limit: usize },
    #[error("invalid request: {reason}")]
    InvalidRequest { id: Value, reason: String },
    #[error("invalid tools/call params: {reason}")]
    InvalidParams { id: Value, reason: String },
}

impl DecodeError {
    pub fn id(&self) -> Value {
        match self {
            DecodeError::Oversized { .. } => Value::Null,
            DecodeError::Syntax { id, .. }
            | DecodeError::InvalidRequest { id, .. }
            | DecodeError::InvalidParams { id, .. } => id.clone(),
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        let code = match self {
            DecodeError::Syntax { .. } | DecodeError::Oversized { .. } => jrpc::PARSE_ERROR,
            DecodeError::InvalidRequest { .. } => jrpc::INVALID_REQUEST,
            DecodeError::InvalidParams { .. } => jrpc::INVALID_PARAMS,
        };
        let detail = match self {
            DecodeError::Oversized { length, limit } => {
                Some(serde_json::json!({ "length": length, "limit": limit }))
            }
            _ => None,
        };
        ErrorDescriptor::new(ErrorKind::MalformedMessage, self.to_string(), detail).with_code(code)
    }
}

/// Only strings and numbers are usable correlation tokens.
fn usable_id(value: &Value) -> bool {
    value.is_string() || value.is_number()
}

/// Finds an `"id": <string or number>` member in a frame that is not valid
/// JSON, such as a line cut off mid-message.
///
/// Returns [`Value::Null`] unless a complete, usable value follows the first
/// `"id"` key.
fn scan_id(frame: &[u8]) -> Value {
    const KEY: &[u8] = b"\"id\"";
    let Some(start) = frame.windows(KEY.len()).position(|w| w == KEY) else {
        return Value::Null;
    };
    let rest = frame[start + KEY.len()..].trim_ascii_start();
    let Some(rest) = rest.strip_prefix(b":") else {
        return Value::Null;
    };
    let mut values =
        serde_json::Deserializer::from_slice(rest.trim_ascii_start()).into_iter::<Value>();
    match values.next() {
        Some(Ok(id)) if usable_id(&id) => id,
        _ => Value::Null,
    }
}

/// Parses one frame.
///
/// A message with an `id` is a request. A message without one is accepted as
/// a notification only when its method is in the `notifications/` namespace;
/// anything else without an `id` is malformed.
pub fn decode_frame(frame: &[u8]) -> Result<Incoming, DecodeError> {
    let value: Value = serde_json::from_slice(frame).map_err(|source| DecodeError::Syntax {
        id: scan_id(frame),
        source,
    })?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::InvalidRequest {
            id: Value::Null,
            reason: "message must be a JSON object".to_string(),
        });
    };

    let id = match object.remove("id") {
        Some(id) if usable_id(&id) => Some(id),
        Some(_) => {
            return Err(DecodeError::InvalidRequest {
                id: Value::Null,
                reason: "id must be a string or a number".to_string(),
            });
        }
        None => None,
    };
    let recovered = id.clone().unwrap_or(Value::Null);
    let invalid = |reason: &str| DecodeError::InvalidRequest {
        id: recovered.clone(),
        reason: reason.to_string(),
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(invalid("jsonrpc must be \"2.0\""));
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(invalid("method must be a string")),
    };
    let params = match object.remove("params") {
        None => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
        Some(_) => return Err(invalid("params must be an object or an array")),
    };

    match id {
        Some(id) => Ok(Incoming::Request(Request::new(method, params, id))),
        None if method.starts_with("notifications/") => {
            Ok(Incoming::Notification(Notification::new(method, params)))
        }
        None => Err(invalid("missing id")),
    }
}

/// Extracts the invocation from a `tools/call` request.
pub fn invocation_from_request(request: &Request) -> Result<InvocationRequest, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidParams {
        id: request.id.clone(),
        reason: reason.to_string(),
    };
    let params = match &request.params {
        Some(Value::Object(params)) => params,
        Some(_) => return Err(invalid("params must be an object")),
        None => return Err(invalid("missing params")),
    };
    let name = match params.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => return Err(invalid("name must be a string")),
        None => return Err(invalid("missing tool name")),
    };
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(_) => return Err(invalid("arguments must be an object")),
    };
    Ok(InvocationRequest::new(request.id.clone(), name, arguments))
}

/// One item of tool output content.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

/// The `result` member of a successful `tools/call` response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn from_output(output: ToolOutput) -> Result<Self, serde_json::Error> {
        Ok(match output {
            ToolOutput::Text(text) => CallToolResult {
                content: vec![ToolContent::Text { text }],
                structured_content: None,
                is_error: false,
            },
            ToolOutput::Structured(value) => CallToolResult {
                content: vec![ToolContent::Text {
                    text: serde_json::to_string_pretty(&value)?,
                }],
                structured_content: Some(value),
                is_error: false,
            },
        })
    }
}

/// A JSON-RPC error response for `id`, carrying the error's kind and detail
/// in `data`.
pub fn failure_response(id: Value, error: &ErrorDescriptor) -> Response<Value> {
    Response::err(jrpc::Error::from(error), id)
}

/// Maps an invocation result onto the wire: success becomes `result`,
/// failure becomes `error` with the kind in `error.data.kind`.
pub fn result_response(result: InvocationResult) -> Response<Value> {
    match result.outcome {
        Ok(output) => match CallToolResult::from_output(output) {
            Ok(call) => Response::new(call, result.id).erase(),
            Err(e) => failure_response(result.id, &ErrorDescriptor::handler(e)),
        },
        Err(error) => failure_response(result.id, &error),
    }
}

/// Serializes a response as one frame body (no terminator).
pub fn encode_response(response: &Response<Value>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(response)
}
