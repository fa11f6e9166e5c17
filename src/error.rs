//! Error taxonomy shared by the decoder, dispatcher and encoder.
//!
//! Faults a client can trigger are represented as [`ErrorDescriptor`] values and
//! always end up in a correlated failure response. Faults that can only happen
//! while the server is being assembled ([`RegistryError`]) are fatal and abort
//! startup.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::{Display, Formatter};

use crate::jrpc;

/// The kind of failure reported to the client.
///
/// Serialized by variant name (`"UnknownTool"`, `"TypeMismatch"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The frame could not be parsed into a request.
    MalformedMessage,
    /// The JSON-RPC method is not served.
    UnknownMethod,
    /// No tool with the requested name is registered.
    UnknownTool,
    /// A required parameter was not supplied.
    MissingRequiredArgument,
    /// A supplied value does not satisfy the declared parameter type.
    TypeMismatch,
    /// The tool handler failed.
    HandlerError,
    /// No resource with the requested URI is registered.
    UnknownResource,
    /// No prompt with the requested name is registered.
    UnknownPrompt,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedMessage => "MalformedMessage",
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::UnknownTool => "UnknownTool",
            ErrorKind::MissingRequiredArgument => "MissingRequiredArgument",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::HandlerError => "HandlerError",
            ErrorKind::UnknownResource => "UnknownResource",
            ErrorKind::UnknownPrompt => "UnknownPrompt",
        }
    }

    /// The JSON-RPC error code used when this kind goes on the wire.
    pub fn default_code(&self) -> i32 {
        match self {
            ErrorKind::MalformedMessage => jrpc::INVALID_REQUEST,
            ErrorKind::UnknownMethod => jrpc::METHOD_NOT_FOUND,
            ErrorKind::UnknownTool
            | ErrorKind::MissingRequiredArgument
            | ErrorKind::TypeMismatch
            | ErrorKind::UnknownResource
            | ErrorKind::UnknownPrompt => jrpc::INVALID_PARAMS,
            ErrorKind::HandlerError => jrpc::INTERNAL_ERROR,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-visible failure: what went wrong, a human-readable message, and
/// optional structured context.
///
/// # Examples
///
/// ```
/// use ndtools::error::{ErrorDescriptor, ErrorKind};
///
/// let error = ErrorDescriptor::missing_argument("vrf_name");
/// assert_eq!(error.kind, ErrorKind::MissingRequiredArgument);
/// assert_eq!(error.detail.unwrap()["parameter"], "vrf_name");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(skip)]
    code: i32,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>, detail: Option<Value>) -> Self {
        ErrorDescriptor {
            kind,
            message: message.into(),
            detail,
            code: kind.default_code(),
        }
    }

    /// Overrides the JSON-RPC code that [`ErrorKind::default_code`] would pick.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ErrorKind::UnknownMethod,
            format!("Method not found: {method}"),
            Some(json!({ "method": method })),
        )
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownTool,
            format!("Unknown tool: {name}"),
            Some(json!({ "tool": name })),
        )
    }

    pub fn missing_argument(parameter: &str) -> Self {
        Self::new(
            ErrorKind::MissingRequiredArgument,
            format!("Missing required argument: {parameter}"),
            Some(json!({ "parameter": parameter })),
        )
    }

    pub fn type_mismatch(parameter: &str, expected: Value, actual: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("Argument '{parameter}' does not match its declared type"),
            Some(json!({ "parameter": parameter, "expected": expected, "actual": actual })),
        )
    }

    pub fn handler(cause: impl Display) -> Self {
        let cause = cause.to_string();
        Self::new(
            ErrorKind::HandlerError,
            "Tool handler failed",
            Some(json!({ "cause": cause })),
        )
    }

    pub fn unknown_resource(uri: &str) -> Self {
        Self::new(
            ErrorKind::UnknownResource,
            format!("Unknown resource: {uri}"),
            Some(json!({ "uri": uri })),
        )
    }

    pub fn unknown_prompt(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownPrompt,
            format!("Unknown prompt: {name}"),
            Some(json!({ "prompt": name })),
        )
    }
}

impl Display for ErrorDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Registration-time failures. These indicate a programming error in how the
/// server was assembled, never a runtime condition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("resource '{0}' is already registered")]
    DuplicateResource(String),
    #[error("prompt '{0}' is already registered")]
    DuplicatePrompt(String),
    #[error("parameter '{parameter}' of '{owner}' is declared twice")]
    DuplicateParameter { owner: String, parameter: String },
    #[error("default for parameter '{parameter}' of '{owner}' does not match its declared type")]
    InvalidDefault { owner: String, parameter: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_by_name() {
        let value = serde_json::to_value(ErrorKind::MissingRequiredArgument).unwrap();
        assert_eq!(value, json!("MissingRequiredArgument"));
        assert_eq!(ErrorKind::UnknownTool.to_string(), "UnknownTool");
    }

    #[test]
    fn descriptor_omits_code_and_empty_detail() {
        let error = ErrorDescriptor::new(ErrorKind::HandlerError, "boom", None);
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value, json!({ "kind": "HandlerError", "message": "boom" }));
        assert_eq!(error.code(), jrpc::INTERNAL_ERROR);
    }

    #[test]
    fn code_override_sticks() {
        let error = ErrorDescriptor::new(ErrorKind::MalformedMessage, "bad json", None)
            .with_code(jrpc::PARSE_ERROR);
        assert_eq!(error.code(), jrpc::PARSE_ERROR);
        assert_eq!(error.kind, ErrorKind::MalformedMessage);
    }

    #[test]
    fn handler_error_preserves_cause() {
        let error = ErrorDescriptor::handler("content 'x' not found");
        assert_eq!(error.detail.unwrap()["cause"], "content 'x' not found");
    }
}
