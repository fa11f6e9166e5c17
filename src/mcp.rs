//! MCP method routing.
//!
//! [`Service`] turns one decoded frame into at most one response. It owns the
//! frozen tool, resource and prompt registries and never blocks on anything
//! but the handlers themselves.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use logwise::privacy::LogIt;

use crate::codec::{self, DecodeError, Incoming};
use crate::content::ContentProvider;
use crate::error::ErrorDescriptor;
use crate::jrpc::{Request, Response};
use crate::mcp::dispatch::{Dispatcher, Status, guarded};
use crate::mcp::prompts::PromptRegistry;
use crate::mcp::resources::{ReadResourceResult, ResourceRegistry};
use crate::mcp::tools::ToolRegistry;

pub mod dispatch;
pub mod prompts;
pub mod resources;
pub mod tools;

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Identity reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl ServerInfo {
    /// Identity with this crate's version and no instructions.
    pub fn new(name: impl Into<String>) -> Self {
        ServerInfo {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }

    /// Usage notes for the client, sent in the `initialize` result.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Everything a [`Service`] serves, assembled once at startup.
#[derive(Debug, Default)]
pub struct Catalog {
    pub tools: ToolRegistry,
    pub resources: ResourceRegistry,
    pub prompts: PromptRegistry,
}

/// What happened to one frame.
#[derive(Debug)]
pub enum Handled {
    /// A request was answered (successfully or not).
    Response(Response<Value>),
    /// The frame was not a usable message; the response reports why.
    Rejected(Response<Value>),
    /// A notification was accepted; nothing is sent back.
    Notification,
}

impl Handled {
    /// The response to write, if any.
    pub fn response(&self) -> Option<&Response<Value>> {
        match self {
            Handled::Response(r) | Handled::Rejected(r) => Some(r),
            Handled::Notification => None,
        }
    }
}

/// Answers MCP requests against a fixed [`Catalog`].
///
/// A `Service` is stateless between requests: the same frame always gets the
/// same answer (apart from the echoed `id`). Handling never fails; every
/// problem becomes an error response.
pub struct Service {
    info: ServerInfo,
    dispatcher: Dispatcher,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
    content: Arc<dyn ContentProvider>,
}

impl Service {
    /// `content` backs resource reads; tools and prompts capture their own
    /// provider when they are declared.
    pub fn new(info: ServerInfo, catalog: Catalog, content: Arc<dyn ContentProvider>) -> Self {
        Service {
            info,
            dispatcher: Dispatcher::new(Arc::new(catalog.tools)),
            resources: catalog.resources,
            prompts: catalog.prompts,
            content,
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Decodes and answers one frame.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtools::content::EmbeddedContent;
    /// use ndtools::mcp::{Catalog, Handled, ServerInfo, Service};
    /// use std::sync::Arc;
    ///
    /// let info = ServerInfo::new("demo");
    /// let service = Service::new(info, Catalog::default(), Arc::new(EmbeddedContent));
    ///
    /// let handled = service.handle_frame(br#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#);
    /// assert!(matches!(handled, Handled::Response(ref r) if r.id == "a" && r.error.is_none()));
    ///
    /// let handled = service.handle_frame(br#"{"jsonrpc":"2.0","id":"b","method":"tools/call","params":{"name":"nope"}}"#);
    /// let error = handled.response().unwrap().error.as_ref().unwrap();
    /// assert_eq!(error.code, -32602);
    ///
    /// let handled = service.handle_frame(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
    /// assert!(handled.response().is_none());
    /// ```
    pub fn handle_frame(&self, frame: &[u8]) -> Handled {
        match codec::decode_frame(frame) {
            Ok(Incoming::Request(request)) => Handled::Response(self.handle(request)),
            Ok(Incoming::Notification(notification)) => {
                logwise::info_sync!(
                    "notification {method}",
                    method = LogIt(&notification.method)
                );
                Handled::Notification
            }
            Err(e) => self.reject(e),
        }
    }

    /// Answers a frame that could not be decoded.
    pub fn reject(&self, error: DecodeError) -> Handled {
        logwise::warn_sync!("malformed frame: {e}", e = LogIt(&error.to_string()));
        Handled::Rejected(codec::failure_response(error.id(), &error.descriptor()))
    }

    /// Routes a decoded request by method name.
    pub fn handle(&self, request: Request) -> Response<Value> {
        match request.method.as_str() {
            "initialize" => Response::new(self.initialize(), request.id).erase(),
            "ping" => Response::new(json!({}), request.id),
            "tools/list" => Response::new(self.tools().list(), request.id).erase(),
            "tools/call" => self.call_tool(&request),
            "resources/list" => Response::new(self.resources.list(), request.id).erase(),
            "resources/read" => self.read_resource(&request),
            "prompts/list" => Response::new(self.prompts.list(), request.id).erase(),
            "prompts/get" => self.get_prompt(&request),
            other => codec::failure_response(request.id, &ErrorDescriptor::unknown_method(other)),
        }
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false },
            }),
            server_info: json!({ "name": self.info.name, "version": self.info.version }),
            instructions: self.info.instructions.clone(),
        }
    }

    fn call_tool(&self, request: &Request) -> Response<Value> {
        let invocation = match codec::invocation_from_request(request) {
            Ok(invocation) => invocation,
            Err(e) => return reject_params(e),
        };
        let tool = invocation.tool_name.clone();
        let result = self.dispatcher.dispatch(invocation);
        match (result.status(), result.error()) {
            (Status::Success, _) => {
                logwise::info_sync!("tools/call {tool} succeeded", tool = LogIt(&tool));
            }
            (Status::Failure, error) => {
                let kind = error.map(|e| e.kind.as_str()).unwrap_or_default();
                logwise::warn_sync!(
                    "tools/call {tool} failed: {kind}",
                    tool = LogIt(&tool),
                    kind = LogIt(&kind)
                );
            }
        }
        codec::result_response(result)
    }

    fn read_resource(&self, request: &Request) -> Response<Value> {
        let uri = match string_param(request, "uri") {
            Ok(uri) => uri,
            Err(e) => return reject_params(e),
        };
        let Some(resource) = self.resources.lookup(&uri) else {
            return codec::failure_response(
                request.id.clone(),
                &ErrorDescriptor::unknown_resource(&uri),
            );
        };
        let read = guarded(&format!("resource {uri}"), || {
            resource.read(self.content.as_ref()).map_err(|e| {
                logwise::warn_sync!(
                    "resources/read {uri} failed: {e}",
                    uri = LogIt(&uri),
                    e = LogIt(&e.to_string())
                );
                ErrorDescriptor::handler(e)
            })
        });
        match read {
            Ok(contents) => Response::new(
                ReadResourceResult {
                    contents: vec![contents],
                },
                request.id.clone(),
            )
            .erase(),
            Err(error) => codec::failure_response(request.id.clone(), &error),
        }
    }

    fn get_prompt(&self, request: &Request) -> Response<Value> {
        let name = match string_param(request, "name") {
            Ok(name) => name,
            Err(e) => return reject_params(e),
        };
        let arguments = match object_param(request, "arguments") {
            Ok(arguments) => arguments,
            Err(e) => return reject_params(e),
        };
        let Some(prompt) = self.prompts.lookup(&name) else {
            return codec::failure_response(
                request.id.clone(),
                &ErrorDescriptor::unknown_prompt(&name),
            );
        };
        match guarded(&format!("prompt {name}"), || prompt.get(&arguments)) {
            Ok(result) => Response::new(result, request.id.clone()).erase(),
            Err(error) => codec::failure_response(request.id.clone(), &error),
        }
    }
}

fn reject_params(error: DecodeError) -> Response<Value> {
    logwise::warn_sync!("invalid params: {e}", e = LogIt(&error.to_string()));
    codec::failure_response(error.id(), &error.descriptor())
}

fn params(request: &Request) -> Result<&Map<String, Value>, DecodeError> {
    match &request.params {
        Some(Value::Object(params)) => Ok(params),
        _ => Err(DecodeError::InvalidParams {
            id: request.id.clone(),
            reason: format!("{} requires object params", request.method),
        }),
    }
}

fn string_param(request: &Request, name: &str) -> Result<String, DecodeError> {
    match params(request)?.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(DecodeError::InvalidParams {
            id: request.id.clone(),
            reason: format!("{name} must be a string"),
        }),
    }
}

/// An optional object member; absent and `null` both mean empty.
fn object_param(request: &Request, name: &str) -> Result<Map<String, Value>, DecodeError> {
    match params(request)?.get(name) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(value)) => Ok(value.clone()),
        Some(_) => Err(DecodeError::InvalidParams {
            id: request.id.clone(),
            reason: format!("{name} must be an object"),
        }),
    }
}

#[derive(Debug, Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    capabilities: Value,
    #[serde(rename = "serverInfo")]
    server_info: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}
