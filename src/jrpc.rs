//! JSON-RPC 2.0 envelope types.
//!
//! Every frame exchanged with the client is one of these messages. The types
//! are deliberately thin: the decoder in [`crate::codec`] decides which frames
//! are acceptable, and the method router in [`crate::mcp`] decides what a
//! request means.
//!
//! # Examples
//!
//! ```
//! use ndtools::jrpc::{Error, Response};
//! use serde_json::json;
//!
//! let ok = Response::new(json!({"tools": []}), json!(1));
//! let text = serde_json::to_string(&ok).unwrap();
//! assert!(text.contains("\"result\""));
//! assert!(!text.contains("\"error\""));
//!
//! let failed: Response<serde_json::Value> = Response::err(Error::method_not_found(), json!(2));
//! assert_eq!(failed.error.unwrap().code, -32601);
//! ```

use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::{Display, Formatter};

use crate::error::ErrorDescriptor;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A JSON-RPC 2.0 request: a method call that expects exactly one response
/// carrying the same `id`.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
pub struct Request {
    /// The JSON-RPC protocol version (must be "2.0")
    pub jsonrpc: String,
    /// The name of the method to invoke
    pub method: String,
    /// Optional parameters for the method call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation token echoed in the response
    pub id: Value,
}

impl Request {
    pub fn new(method: String, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method,
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 notification. Notifications carry no `id` and never get a
/// response.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: String, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// Holds either a `result` or an `error`, never both. The type parameter is
/// the result type; [`Response::erase`] turns any serializable result into a
/// `serde_json::Value` so handlers with different result types can share one
/// return type.
#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Response<R> {
    /// The JSON-RPC protocol version (must be "2.0")
    pub jsonrpc: String,
    /// The result of the method call (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    /// Error information if the method call failed (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    /// The same identifier that was in the request
    pub id: Value,
}

impl<R> Response<R> {
    pub fn new(result: R, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn err(e: Error, id: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(e),
            id,
        }
    }

    /// Converts a typed response into a response with a `serde_json::Value`
    /// result.
    ///
    /// A result that fails to serialize becomes an internal error response
    /// for the same `id`.
    pub fn erase(self) -> Response<Value>
    where
        R: Serialize,
    {
        let id = self.id;
        match self.result.map(serde_json::to_value).transpose() {
            Ok(result) => Response {
                jsonrpc: self.jsonrpc,
                result,
                error: self.error,
                id,
            },
            Err(e) => Response::err(Error::from_error(e), id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// # Standard Error Codes
///
/// * `-32700` - Parse error (Invalid JSON)
/// * `-32600` - Invalid Request
/// * `-32601` - Method not found
/// * `-32602` - Invalid params
/// * `-32603` - Internal error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Error {
    /// Error code as defined in JSON-RPC 2.0 specification
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional information about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            code,
            message,
            data,
        }
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found".to_string(), None)
    }

    /// Creates an "Internal error" (code -32603) from a standard Rust error.
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        Self::new(INTERNAL_ERROR, error.to_string(), None)
    }
}

impl From<&ErrorDescriptor> for Error {
    /// The descriptor's kind and detail travel in `data`, so a client can
    /// branch on `data.kind` without parsing the message.
    fn from(descriptor: &ErrorDescriptor) -> Self {
        let mut data = json!({ "kind": descriptor.kind });
        if let Some(detail) = &descriptor.detail {
            data["detail"] = detail.clone();
        }
        Error::new(descriptor.code(), descriptor.message.clone(), Some(data))
    }
}
