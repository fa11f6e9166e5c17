//! The Nexus Dashboard developer reference catalog.
//!
//! Every tool, resource and prompt the server offers is declared here against
//! a shared [`ContentProvider`].

use serde_json::{Map, Value, json};
use std::sync::Arc;

use crate::content::ContentProvider;
use crate::error::RegistryError;
use crate::mcp::Catalog;
use crate::mcp::prompts::{PromptDescriptor, PromptRegistry};
use crate::mcp::resources::{ResourceDescriptor, ResourceRegistry};
use crate::mcp::tools::{
    Arguments, Handler, ParamType, Parameter, ReturnType, ToolDescriptor, ToolError, ToolOutput,
    ToolRegistry, ToolRegistryBuilder,
};

pub mod attachments;

use attachments::{AttachmentQuery, VrfAttachmentsResponse};

pub const SERVER_NAME: &str = "NexusDashboardDeveloperTools";

pub const INSTRUCTIONS: &str = "This server provides information that will be useful for \
developers working with the Nexus Dashboard REST API. It includes tools for example payloads, \
links to Pydantic documentation, links to example Ansible playbooks, and more.";

pub const VRF_PAYLOAD: &str = "payloads/v3/vrf.json";
pub const VRF_ATTACHMENTS_RESPONSE: &str = "responses/v3/vrf_attachments.json";
pub const ANSIBLE_DEVELOPER_ROLE: &str = "prompts/ansible_developer_role.md";

const ATTACHMENTS_ENDPOINT: &str = "GET /appcenter/cisco/ndfc/api/v1/lan-fabric/rest/top-down/\
fabrics/{fabric_name}/vrfs/attachments?vrf-names={comma_separated_vrf_names}";

/// Serves a JSON content file as structured output.
struct JsonDocument {
    content: Arc<dyn ContentProvider>,
    id: &'static str,
}

impl Handler for JsonDocument {
    fn call(&self, _args: &Arguments) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Structured(self.content.get(self.id)?.json()?))
    }
}

/// Registers the same document under its short name and its long legacy name.
fn register_document(
    tools: &mut ToolRegistryBuilder,
    names: [&str; 2],
    description: &str,
    document: JsonDocument,
) -> Result<(), RegistryError> {
    let handler: Arc<dyn Handler> = Arc::new(document);
    for name in names {
        tools.register(ToolDescriptor::with_shared_handler(
            name,
            description,
            ReturnType::Structured,
            Arc::clone(&handler),
        ))?;
    }
    Ok(())
}

fn query_attachments(
    content: &dyn ContentProvider,
    args: &Arguments,
) -> Result<ToolOutput, ToolError> {
    let limit = match args.i64("limit") {
        Some(n) if n < 0 => {
            return Err(ToolError::new(format!("limit must not be negative, got {n}")));
        }
        Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        None => None,
    };
    let query = AttachmentQuery {
        vrf_name: args.str("vrf_name").map(str::to_string),
        switch_role: args.str("switch_role").map(str::to_string),
        attached_only: args.bool("attached_only").unwrap_or(false),
        limit,
    };
    let document = content.get(VRF_ATTACHMENTS_RESPONSE)?.json()?;
    let response =
        VrfAttachmentsResponse::from_value(document).map_err(|e| ToolError::new(e.to_string()))?;
    let found = query.run(&response);

    let mut result = Map::new();
    if let Some(name) = &query.vrf_name {
        result.insert("vrfName".to_string(), Value::String(name.clone()));
    }
    result.insert("count".to_string(), json!(found.len()));
    let attachments = serde_json::to_value(&found).map_err(|e| ToolError::new(e.to_string()))?;
    result.insert("attachments".to_string(), attachments);
    Ok(ToolOutput::Structured(Value::Object(result)))
}

/// The Nexus Dashboard tools, in listing order. Handlers read through
/// `content` on every call.
pub fn tools(content: &Arc<dyn ContentProvider>) -> Result<ToolRegistry, RegistryError> {
    let mut tools = ToolRegistry::builder();

    register_document(
        &mut tools,
        ["vrf_payload_example", "nexus_dashboard_version_3_payload_vrf"],
        "Nexus Dashboard Version 3 VRF Payload. Example request body for creating a VRF.",
        JsonDocument {
            content: Arc::clone(content),
            id: VRF_PAYLOAD,
        },
    )?;
    register_document(
        &mut tools,
        [
            "vrf_attachments_response_example",
            "nexus_dashboard_version_3_response_vrf_attachments",
        ],
        &format!("Nexus Dashboard Version 3 VRF Attachments Response for {ATTACHMENTS_ENDPOINT}"),
        JsonDocument {
            content: Arc::clone(content),
            id: VRF_ATTACHMENTS_RESPONSE,
        },
    )?;

    let reference = Arc::clone(content);
    tools.register(
        ToolDescriptor::new(
            "vrf_payload_reference",
            "Markdown reference describing the fields of the VRF or VRF attachment payload.",
            ReturnType::Text,
            move |args: &Arguments| {
                let topic = args.str("topic").unwrap_or("vrf");
                let page = reference.get(&format!("payloads/v3/md/{topic}.md"))?;
                Ok(ToolOutput::Text(page.text))
            },
        )
        .with_parameter(
            Parameter::optional("topic", ParamType::String, "Which payload to describe")
                .with_default("vrf")
                .with_choices(["vrf", "vrf_attachment"]),
        ),
    )?;

    let attachments = Arc::clone(content);
    tools.register(
        ToolDescriptor::new(
            "vrf_attachments_query",
            "Filters the example VRF attachments response by VRF name, switch role and \
             attachment state.",
            ReturnType::Structured,
            move |args: &Arguments| query_attachments(attachments.as_ref(), args),
        )
        .with_parameter(Parameter::optional("vrf_name", ParamType::String, "Only this VRF"))
        .with_parameter(Parameter::optional(
            "switch_role",
            ParamType::String,
            "Only switches with this role, e.g. 'leaf' or 'border spine'",
        ))
        .with_parameter(
            Parameter::optional(
                "attached_only",
                ParamType::Boolean,
                "Only switches where the VRF is attached",
            )
            .with_default(false),
        )
        .with_parameter(Parameter::optional(
            "limit",
            ParamType::Integer,
            "Maximum number of attachments to return",
        )),
    )?;

    Ok(tools.build())
}

/// The reference files exposed as resources.
pub fn resources() -> Result<ResourceRegistry, RegistryError> {
    let mut resources = ResourceRegistry::builder();
    resources.register(ResourceDescriptor::new(
        "file:///resources/payloads/v3/md/vrf.md",
        "VRF Payload Markdown",
        "Markdown file that describes the VRF payload.",
        "payloads/v3/md/vrf.md",
    ))?;
    resources.register(ResourceDescriptor::new(
        "file:///resources/payloads/v3/md/vrf_attachment.md",
        "VRF Attachment Payload Markdown",
        "Markdown file that describes the VRF attachment payload.",
        "payloads/v3/md/vrf_attachment.md",
    ))?;
    resources.register(ResourceDescriptor::new(
        "file:///resources/payloads/vrf.json",
        "resource_nexus_dashboard_version_3_payload_vrf",
        "Nexus Dashboard Version 3 VRF Payload Resource",
        VRF_PAYLOAD,
    ))?;
    Ok(resources.build())
}

pub fn prompts(content: &Arc<dyn ContentProvider>) -> Result<PromptRegistry, RegistryError> {
    let mut prompts = PromptRegistry::builder();
    let role = Arc::clone(content);
    prompts.register(
        PromptDescriptor::new(
            "ansible_developer_role",
            "Loads and returns the Ansible developer role prompt from a specified file.",
            move |args: &Arguments| {
                let path = args.str("file_path").unwrap_or(ANSIBLE_DEVELOPER_ROLE);
                Ok(role.get(path)?.text)
            },
        )
        .with_argument(
            Parameter::optional("file_path", ParamType::String, "Path to the prompt template file")
                .with_default(ANSIBLE_DEVELOPER_ROLE),
        ),
    )?;
    Ok(prompts.build())
}

/// The full catalog served by `ndtools`.
pub fn catalog(content: &Arc<dyn ContentProvider>) -> Result<Catalog, RegistryError> {
    Ok(Catalog {
        tools: tools(content)?,
        resources: resources()?,
        prompts: prompts(content)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EmbeddedContent;
    use crate::error::ErrorKind;
    use crate::mcp::dispatch::{Dispatcher, InvocationRequest, InvocationResult};

    fn dispatcher() -> Dispatcher {
        let content: Arc<dyn ContentProvider> = Arc::new(EmbeddedContent);
        Dispatcher::new(Arc::new(tools(&content).unwrap()))
    }

    fn call(name: &str, arguments: Value) -> InvocationResult {
        let arguments = arguments.as_object().cloned().unwrap_or_default();
        dispatcher().dispatch(InvocationRequest::new(json!("t"), name, arguments))
    }

    fn structured(result: InvocationResult) -> Value {
        match result.outcome {
            Ok(ToolOutput::Structured(value)) => value,
            other => panic!("expected structured output, got {other:?}"),
        }
    }

    #[test]
    fn catalog_registers_everything() {
        let content: Arc<dyn ContentProvider> = Arc::new(EmbeddedContent);
        let catalog = catalog(&content).unwrap();
        let names: Vec<&str> = catalog.tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "vrf_payload_example",
                "nexus_dashboard_version_3_payload_vrf",
                "vrf_attachments_response_example",
                "nexus_dashboard_version_3_response_vrf_attachments",
                "vrf_payload_reference",
                "vrf_attachments_query",
            ]
        );
        assert_eq!(catalog.resources.len(), 3);
        assert!(catalog.prompts.lookup("ansible_developer_role").is_some());
    }

    #[test]
    fn aliases_share_output() {
        let short = structured(call("vrf_payload_example", json!({})));
        let long = structured(call("nexus_dashboard_version_3_payload_vrf", json!({})));
        assert_eq!(short, long);
        assert_eq!(short["vrfName"], "ansible-vrf-int1");
    }

    #[test]
    fn reference_topic_is_restricted() {
        let result = call("vrf_payload_reference", json!({ "topic": "vrf_attachment" }));
        assert!(matches!(result.outcome, Ok(ToolOutput::Text(ref t)) if !t.is_empty()));
        let result = call("vrf_payload_reference", json!({ "topic": "../secrets" }));
        assert_eq!(result.error().unwrap().kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn query_filters_attachments() {
        let value = structured(call(
            "vrf_attachments_query",
            json!({ "vrf_name": "ansible-vrf-int1", "switch_role": "leaf" }),
        ));
        assert_eq!(value["vrfName"], "ansible-vrf-int1");
        assert_eq!(value["count"], 2);
        assert_eq!(value["attachments"][0]["switchName"], "cvd-1312-leaf");

        let value = structured(call("vrf_attachments_query", json!({ "attached_only": true })));
        assert_eq!(value["count"], 2);
        assert!(value.get("vrfName").is_none());
    }

    #[test]
    fn negative_limit_is_a_handler_error() {
        let result = call("vrf_attachments_query", json!({ "limit": -1 }));
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::HandlerError);
        assert!(error.detail.as_ref().unwrap()["cause"]
            .as_str()
            .unwrap()
            .contains("negative"));
    }

    #[test]
    fn prompt_reads_default_file() {
        let content: Arc<dyn ContentProvider> = Arc::new(EmbeddedContent);
        let prompts = prompts(&content).unwrap();
        let result = prompts
            .lookup("ansible_developer_role")
            .unwrap()
            .get(&Map::new())
            .unwrap();
        assert_eq!(result.messages.len(), 1);
        let missing = prompts
            .lookup("ansible_developer_role")
            .unwrap()
            .get(json!({ "file_path": "prompts/none.md" }).as_object().unwrap())
            .unwrap_err();
        assert_eq!(missing.kind, ErrorKind::HandlerError);
    }
}
