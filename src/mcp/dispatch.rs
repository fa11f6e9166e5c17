//! Resolving, validating and executing tool invocations.
//!
//! [`Dispatcher::dispatch`] never fails and never panics past its boundary:
//! every outcome, including a panicking handler, is captured in the returned
//! [`InvocationResult`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use logwise::privacy::LogIt;

use crate::error::ErrorDescriptor;
use crate::mcp::tools::{Arguments, Parameter, ToolOutput, ToolRegistry, json_type_name};

/// One decoded `tools/call` request.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Client-supplied correlation token.
    pub id: Value,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(id: Value, tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        InvocationRequest {
            id,
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Whether an invocation produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// The outcome of one invocation, correlated to its request by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub id: Value,
    pub outcome: Result<ToolOutput, ErrorDescriptor>,
}

impl InvocationResult {
    pub fn success(id: Value, output: ToolOutput) -> Self {
        InvocationResult {
            id,
            outcome: Ok(output),
        }
    }

    pub fn failure(id: Value, error: ErrorDescriptor) -> Self {
        InvocationResult {
            id,
            outcome: Err(error),
        }
    }

    pub fn status(&self) -> Status {
        match self.outcome {
            Ok(_) => Status::Success,
            Err(_) => Status::Failure,
        }
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.outcome.as_ref().err()
    }
}

/// Binds raw arguments to declared parameters.
///
/// Parameters are checked in declaration order and the first problem wins.
/// An explicit `null` is treated like an omitted argument. Arguments that no
/// parameter declares are dropped.
pub(crate) fn bind(
    owner: &str,
    parameters: &[Parameter],
    raw: &Map<String, Value>,
) -> Result<Arguments, ErrorDescriptor> {
    let mut bound = Arguments::default();
    for parameter in parameters {
        match raw.get(&parameter.name).filter(|v| !v.is_null()) {
            Some(value) => {
                if !parameter.accepts(value) {
                    return Err(ErrorDescriptor::type_mismatch(
                        &parameter.name,
                        parameter.expectation(),
                        json_type_name(value),
                    ));
                }
                bound.insert(parameter.name.clone(), value.clone());
            }
            None if parameter.required => {
                return Err(ErrorDescriptor::missing_argument(&parameter.name));
            }
            None => {
                if let Some(default) = &parameter.default {
                    bound.insert(parameter.name.clone(), default.clone());
                }
            }
        }
    }
    for name in raw.keys() {
        if !parameters.iter().any(|p| &p.name == name) {
            logwise::warn_sync!(
                "ignoring undeclared argument {name} for {owner}",
                name = LogIt(name),
                owner = LogIt(&owner)
            );
        }
    }
    Ok(bound)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Runs `work`, turning a panic into a `HandlerError` failure.
///
/// `what` names the work in the log line.
pub(crate) fn guarded<T>(
    what: &str,
    work: impl FnOnce() -> Result<T, ErrorDescriptor>,
) -> Result<T, ErrorDescriptor> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            logwise::error_sync!(
                "{what} panicked: {message}",
                what = LogIt(&what),
                message = LogIt(&message)
            );
            Err(ErrorDescriptor::handler(message))
        }
    }
}

/// Executes invocations against a frozen [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn dispatch(&self, request: InvocationRequest) -> InvocationResult {
        let InvocationRequest {
            id,
            tool_name,
            arguments,
        } = request;

        let Some(tool) = self.registry.lookup(&tool_name) else {
            return InvocationResult::failure(id, ErrorDescriptor::unknown_tool(&tool_name));
        };

        let bound = match bind(tool.name(), tool.parameters(), &arguments) {
            Ok(bound) => bound,
            Err(error) => return InvocationResult::failure(id, error),
        };

        let handler = tool.handler();
        let what = format!("tool {tool_name}");
        match guarded(&what, || handler.call(&bound).map_err(ErrorDescriptor::handler)) {
            Ok(output) => InvocationResult::success(id, output),
            Err(error) => InvocationResult::failure(id, error),
        }
    }
}
