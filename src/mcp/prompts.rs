//! Prompt templates.
//!
//! Prompts declare their arguments with the same [`Parameter`] type tools use,
//! and arguments are bound by the same rules before the renderer runs.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorDescriptor, RegistryError};
use crate::mcp::dispatch::bind;
use crate::mcp::tools::{Arguments, Parameter, ToolError, validate_parameters};

/// Produces the prompt text from bound arguments.
pub trait Render: Send + Sync {
    fn render(&self, args: &Arguments) -> Result<String, ToolError>;
}

impl<F> Render for F
where
    F: Fn(&Arguments) -> Result<String, ToolError> + Send + Sync,
{
    fn render(&self, args: &Arguments) -> Result<String, ToolError> {
        self(args)
    }
}

/// A prompt template: a name, typed arguments and a renderer.
///
/// Arguments bind exactly like tool parameters, so an ill-typed argument is a
/// `TypeMismatch` and the renderer does not run.
///
/// # Examples
///
/// ```
/// use ndtools::mcp::prompts::PromptDescriptor;
/// use ndtools::mcp::tools::{Arguments, Parameter, ParamType};
///
/// let review = PromptDescriptor::new("review", "Asks for a review", |args: &Arguments| {
///     Ok(format!("Review {}", args.str("path").unwrap_or("everything")))
/// })
/// .with_argument(Parameter::optional("path", ParamType::String, "File to review"));
///
/// let arguments = serde_json::json!({ "path": "src/lib.rs" });
/// let result = review.get(arguments.as_object().unwrap()).unwrap();
/// assert_eq!(result.messages.len(), 1);
/// ```
#[derive(Clone)]
pub struct PromptDescriptor {
    name: String,
    description: String,
    arguments: Vec<Parameter>,
    renderer: Arc<dyn Render>,
}

impl PromptDescriptor {
    pub fn new<F>(name: &str, description: &str, renderer: F) -> Self
    where
        F: Fn(&Arguments) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        PromptDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            arguments: Vec::new(),
            renderer: Arc::new(renderer),
        }
    }

    /// Appends an argument; declaration order is listing order.
    pub fn with_argument(mut self, argument: Parameter) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds `raw` and renders the prompt as a single user message.
    pub fn get(&self, raw: &Map<String, Value>) -> Result<GetPromptResult, ErrorDescriptor> {
        let bound = bind(&self.name, &self.arguments, raw)?;
        let text = self
            .renderer
            .render(&bound)
            .map_err(ErrorDescriptor::handler)?;
        Ok(GetPromptResult {
            description: self.description.clone(),
            messages: vec![PromptMessage::user(text)],
        })
    }
}

impl fmt::Debug for PromptDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptDescriptor")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// One message of a rendered prompt. Always from the `user` role.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: PromptContent,
}

impl PromptMessage {
    fn user(text: String) -> Self {
        PromptMessage {
            role: "user",
            content: PromptContent::Text { text },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptContent {
    Text { text: String },
}

/// Result of `prompts/get`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GetPromptResult {
    pub description: String,
    pub messages: Vec<PromptMessage>,
}

/// Result of `prompts/list`.
#[derive(Debug, Serialize)]
pub struct PromptList {
    prompts: Vec<PromptInfo>,
}

#[derive(Debug, Serialize)]
struct PromptInfo {
    name: String,
    description: String,
    arguments: Vec<PromptArgument>,
}

#[derive(Debug, Serialize)]
struct PromptArgument {
    name: String,
    description: String,
    required: bool,
}

/// Collects prompts before serving starts.
#[derive(Debug, Default)]
pub struct PromptRegistryBuilder {
    prompts: Vec<PromptDescriptor>,
    index: HashMap<String, usize>,
}

impl PromptRegistryBuilder {
    /// Adds a prompt. A repeated name is [`RegistryError::DuplicatePrompt`].
    pub fn register(&mut self, descriptor: PromptDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicatePrompt(descriptor.name));
        }
        validate_parameters(&descriptor.name, &descriptor.arguments)?;
        self.index.insert(descriptor.name.clone(), self.prompts.len());
        self.prompts.push(descriptor);
        Ok(())
    }

    pub fn build(self) -> PromptRegistry {
        PromptRegistry {
            prompts: self.prompts,
            index: self.index,
        }
    }
}

/// Immutable name → prompt table, in registration order.
#[derive(Debug, Default)]
pub struct PromptRegistry {
    prompts: Vec<PromptDescriptor>,
    index: HashMap<String, usize>,
}

impl PromptRegistry {
    pub fn builder() -> PromptRegistryBuilder {
        PromptRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&PromptDescriptor> {
        self.index.get(name).map(|i| &self.prompts[*i])
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn list(&self) -> PromptList {
        PromptList {
            prompts: self
                .prompts
                .iter()
                .map(|p| PromptInfo {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    arguments: p
                        .arguments
                        .iter()
                        .map(|a| PromptArgument {
                            name: a.name.clone(),
                            description: a.description.clone(),
                            required: a.required,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mcp::tools::ParamType;
    use serde_json::json;

    fn greeting() -> PromptDescriptor {
        PromptDescriptor::new("greeting", "Says hello", |args: &Arguments| {
            match args.str("who") {
                Some("nobody") => Err(ToolError::new("nobody to greet")),
                who => Ok(format!("Hello, {}!", who.unwrap_or("developer"))),
            }
        })
        .with_argument(
            Parameter::optional("who", ParamType::String, "Who to greet").with_default("team"),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn renders_one_user_message() {
        let result = greeting().get(&args(json!({ "who": "Ada" }))).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value["messages"],
            json!([{ "role": "user", "content": { "type": "text", "text": "Hello, Ada!" } }])
        );
    }

    #[test]
    fn default_applies_when_omitted() {
        let result = greeting().get(&Map::new()).unwrap();
        assert_eq!(
            result.messages[0].content,
            PromptContent::Text { text: "Hello, team!".to_string() }
        );
    }

    #[test]
    fn binding_and_render_failures_are_descriptors() {
        let err = greeting().get(&args(json!({ "who": 3 }))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        let err = greeting().get(&args(json!({ "who": "nobody" }))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::HandlerError);
    }

    #[test]
    fn duplicate_prompt_is_rejected() {
        let mut builder = PromptRegistry::builder();
        builder.register(greeting()).unwrap();
        assert_eq!(
            builder.register(greeting()).unwrap_err(),
            RegistryError::DuplicatePrompt("greeting".to_string())
        );
        let list = serde_json::to_value(builder.build().list()).unwrap();
        assert_eq!(list["prompts"][0]["arguments"][0]["required"], false);
    }
}
