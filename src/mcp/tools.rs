//! Tool declarations and the tool registry.
//!
//! A tool is declared as a [`ToolDescriptor`]: a unique name, a description,
//! an ordered list of [`Parameter`]s, the shape of its output
//! ([`ReturnType`]) and a [`Handler`]. Descriptors are collected in a
//! [`ToolRegistryBuilder`] at startup and frozen into a [`ToolRegistry`],
//! which is read-only for the rest of the process.
//!
//! # Examples
//!
//! ```
//! use ndtools::mcp::tools::{
//!     Arguments, Parameter, ParamType, ReturnType, ToolDescriptor, ToolOutput, ToolRegistry,
//! };
//!
//! let greet = ToolDescriptor::new(
//!     "greet",
//!     "Greets someone",
//!     ReturnType::Text,
//!     |args: &Arguments| {
//!         let name = args.str("name").unwrap_or("world");
//!         Ok(ToolOutput::Text(format!("Hello, {name}!")))
//!     },
//! )
//! .with_parameter(Parameter::optional("name", ParamType::String, "Who to greet"));
//!
//! let mut builder = ToolRegistry::builder();
//! builder.register(greet).unwrap();
//! let registry = builder.build();
//! assert!(registry.lookup("greet").is_some());
//! assert!(registry.lookup("wave").is_none());
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::content::ContentError;
use crate::error::RegistryError;

/// Declared type of a parameter, named after the JSON Schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// The JSON Schema name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether `value` satisfies this type without any coercion.
    ///
    /// `integer` only accepts JSON numbers without a fractional part or
    /// exponent (`3`, not `3.0` or `"3"`).
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the JSON type of an arbitrary value, for error details.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared parameter of a tool or prompt.
///
/// Parameters are declared in the order they should appear in the tool's
/// `inputSchema`. Binding never coerces: an argument either has the declared
/// JSON type (and, with [`Parameter::with_choices`], one of the listed values)
/// or the invocation fails before the handler runs.
///
/// # Examples
///
/// ```
/// use ndtools::mcp::tools::{Parameter, ParamType};
///
/// let topic = Parameter::optional("topic", ParamType::String, "Which reference to return")
///     .with_default("vrf")
///     .with_choices(["vrf", "vrf_attachment"]);
/// assert!(!topic.required);
/// assert_eq!(topic.default, Some(serde_json::json!("vrf")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Argument name, unique within one tool.
    pub name: String,
    pub r#type: ParamType,
    /// Shown to the client in the schema.
    pub description: String,
    /// Whether the argument must be supplied (and not `null`).
    pub required: bool,
    /// Bound when an optional argument is omitted.
    pub default: Option<Value>,
    /// Accepted values, when the parameter is an enumeration.
    pub choices: Option<Vec<Value>>,
}

impl Parameter {
    /// A parameter the client must supply.
    pub fn required(name: &str, r#type: ParamType, description: &str) -> Self {
        Parameter {
            name: name.to_string(),
            r#type,
            description: description.to_string(),
            required: true,
            default: None,
            choices: None,
        }
    }

    /// A parameter the client may omit. Without a default it is simply absent
    /// from the bound [`Arguments`].
    pub fn optional(name: &str, r#type: ParamType, description: &str) -> Self {
        Parameter {
            required: false,
            ..Parameter::required(name, r#type, description)
        }
    }

    /// Value bound when the argument is omitted. Only meaningful for optional
    /// parameters.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restricts accepted values to the given set.
    pub fn with_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// JSON Schema fragment for this parameter.
    pub(crate) fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), self.r#type.as_str().into());
        schema.insert("description".to_string(), self.description.clone().into());
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        if let Some(choices) = &self.choices {
            schema.insert("enum".to_string(), Value::Array(choices.clone()));
        }
        Value::Object(schema)
    }

    pub(crate) fn accepts(&self, value: &Value) -> bool {
        self.r#type.matches(value)
            && self
                .choices
                .as_ref()
                .is_none_or(|choices| choices.contains(value))
    }

    /// Expected-value description used in `TypeMismatch` details.
    pub(crate) fn expectation(&self) -> Value {
        match &self.choices {
            Some(choices) => serde_json::json!({ "type": self.r#type, "enum": choices }),
            None => Value::String(self.r#type.as_str().to_string()),
        }
    }
}

/// Checks a parameter list for duplicate names and ill-typed defaults.
pub(crate) fn validate_parameters(owner: &str, parameters: &[Parameter]) -> Result<(), RegistryError> {
    for (i, parameter) in parameters.iter().enumerate() {
        if parameters[..i].iter().any(|p| p.name == parameter.name) {
            return Err(RegistryError::DuplicateParameter {
                owner: owner.to_string(),
                parameter: parameter.name.clone(),
            });
        }
        if let Some(default) = &parameter.default {
            if !parameter.accepts(default) {
                return Err(RegistryError::InvalidDefault {
                    owner: owner.to_string(),
                    parameter: parameter.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Shape of a tool's successful output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Plain or markdown text.
    Text,
    /// A JSON document.
    Structured,
}

/// What a handler produces on success.
///
/// The variant should agree with the tool's declared [`ReturnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Sent as the text of a single content item.
    Text(String),
    /// Sent as `structuredContent`, with its pretty-printed JSON as text.
    Structured(Value),
}

/// Failure reported by a handler. Surfaces to the client as `HandlerError`
/// with this error's message as the cause.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{0}")]
    Message(String),
}

impl ToolError {
    /// A failure described by a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        ToolError::Message(message.into())
    }
}

/// Arguments after binding: every declared parameter that was supplied or
/// has a default, already checked against its declared type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    /// The bound value of `name`, or `None` if it was omitted without a
    /// default.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Convenience accessor for `string` parameters.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Convenience accessor for `integer` parameters.
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Convenience accessor for `boolean` parameters.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }
}

/// Executes a tool with bound arguments.
///
/// Implemented for any `Fn(&Arguments) -> Result<ToolOutput, ToolError>`, so
/// most tools are plain closures. Implement it directly when the handler
/// carries state, as the document tools in [`crate::nexus`] do.
///
/// # Thread Safety
///
/// Handlers are `Send + Sync`; the registry is shared behind an `Arc`.
///
/// # Examples
///
/// ```
/// use ndtools::mcp::tools::{Arguments, Handler, ToolError, ToolOutput};
///
/// struct Constant(&'static str);
///
/// impl Handler for Constant {
///     fn call(&self, _args: &Arguments) -> Result<ToolOutput, ToolError> {
///         Ok(ToolOutput::Text(self.0.to_string()))
///     }
/// }
///
/// let output = Constant("pong").call(&Arguments::default()).unwrap();
/// assert_eq!(output, ToolOutput::Text("pong".to_string()));
/// ```
pub trait Handler: Send + Sync {
    /// Runs the tool. Returning an error, or panicking, is reported to the
    /// client as `HandlerError`; neither affects later requests.
    fn call(&self, args: &Arguments) -> Result<ToolOutput, ToolError>;
}

impl<F> Handler for F
where
    F: Fn(&Arguments) -> Result<ToolOutput, ToolError> + Send + Sync,
{
    fn call(&self, args: &Arguments) -> Result<ToolOutput, ToolError> {
        self(args)
    }
}

/// A tool as declared at startup: name, description, parameters, output
/// shape and handler.
///
/// Descriptors are immutable once registered. Cloning one is cheap; the
/// handler is shared.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
    returns: ReturnType,
    handler: Arc<dyn Handler>,
}

impl ToolDescriptor {
    /// Declares a tool with no parameters. Add them with
    /// [`ToolDescriptor::with_parameter`].
    pub fn new<F>(name: &str, description: &str, returns: ReturnType, handler: F) -> Self
    where
        F: Fn(&Arguments) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        ToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            returns,
            handler: Arc::new(handler),
        }
    }

    /// Builds a descriptor around an already shared handler, e.g. one
    /// registered under several names.
    pub fn with_shared_handler(
        name: &str,
        description: &str,
        returns: ReturnType,
        handler: Arc<dyn Handler>,
    ) -> Self {
        ToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            returns,
            handler,
        }
    }

    /// Appends a parameter; declaration order is schema order.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// The JSON Schema advertised in `tools/list`.
    pub fn input_schema(&self) -> InputSchema {
        InputSchema::new(&self.parameters)
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// JSON Schema for a tool's arguments.
///
/// `properties` keeps declaration order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputSchema {
    r#type: &'static str,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn new(parameters: &[Parameter]) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in parameters {
            if parameter.required {
                required.push(parameter.name.clone());
            }
            properties.insert(parameter.name.clone(), parameter.schema());
        }
        InputSchema {
            r#type: "object",
            properties,
            required,
        }
    }
}

/// Result of `tools/list`.
#[derive(Debug, Serialize)]
pub struct ToolList {
    pub(crate) tools: Vec<ToolInfo>,
}

/// Tool metadata as enumerated to the client.
#[derive(Debug, Serialize)]
pub(crate) struct ToolInfo {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
    #[serde(rename = "outputType")]
    output_type: ReturnType,
}

impl ToolInfo {
    fn from_tool(tool: &ToolDescriptor) -> Self {
        ToolInfo {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema(),
            output_type: tool.returns,
        }
    }
}

/// Collects tool descriptors before serving starts.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistryBuilder {
    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateTool`] if the name is already registered, and
    /// [`RegistryError::DuplicateParameter`] or [`RegistryError::InvalidDefault`]
    /// if the parameter list is inconsistent. All of these are startup
    /// failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtools::error::RegistryError;
    /// use ndtools::mcp::tools::{ReturnType, ToolDescriptor, ToolOutput, ToolRegistry};
    ///
    /// let ping = || {
    ///     ToolDescriptor::new("ping", "Replies pong", ReturnType::Text, |_| {
    ///         Ok(ToolOutput::Text("pong".to_string()))
    ///     })
    /// };
    ///
    /// let mut builder = ToolRegistry::builder();
    /// builder.register(ping()).unwrap();
    /// let err = builder.register(ping()).unwrap_err();
    /// assert!(matches!(err, RegistryError::DuplicateTool(name) if name == "ping"));
    /// assert_eq!(builder.build().len(), 1);
    /// ```
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        validate_parameters(&descriptor.name, &descriptor.parameters)?;
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Freezes the registry. Nothing can be added afterwards.
    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            index: self.index,
        }
    }
}

/// Immutable name → descriptor table, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Finds a tool by its exact, case-sensitive name.
    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|i| &self.tools[*i])
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The `tools/list` result, in registration order.
    pub fn list(&self) -> ToolList {
        ToolList {
            tools: self.tools.iter().map(ToolInfo::from_tool).collect(),
        }
    }
}
