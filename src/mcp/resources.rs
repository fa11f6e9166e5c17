//! Read-only resources addressed by URI.
//!
//! Each resource maps a URI onto a content identifier. Reading a resource asks
//! the [`ContentProvider`] for that identifier at read time, so a content
//! directory override is honoured without re-registering anything.

use serde::Serialize;
use std::collections::HashMap;

use crate::content::{ContentError, ContentProvider, mime_type_for};
use crate::error::RegistryError;

/// A resource: a URI the client can read, backed by one content identifier.
///
/// # Examples
///
/// ```
/// use ndtools::content::EmbeddedContent;
/// use ndtools::mcp::resources::ResourceDescriptor;
///
/// let payload = ResourceDescriptor::new(
///     "file:///resources/payloads/vrf.json",
///     "VRF Payload",
///     "Example VRF create payload",
///     "payloads/v3/vrf.json",
/// );
/// assert_eq!(payload.mime_type(), "application/json");
///
/// let contents = payload.read(&EmbeddedContent).unwrap();
/// assert_eq!(contents.uri, "file:///resources/payloads/vrf.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    uri: String,
    name: String,
    description: String,
    mime_type: String,
    content_id: String,
}

impl ResourceDescriptor {
    /// The MIME type defaults to the one implied by the content identifier.
    pub fn new(uri: &str, name: &str, description: &str, content_id: &str) -> Self {
        ResourceDescriptor {
            uri: uri.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            mime_type: mime_type_for(content_id).to_string(),
            content_id: content_id.to_string(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Loads the current text from `content`.
    pub fn read(&self, content: &dyn ContentProvider) -> Result<ResourceContents, ContentError> {
        let loaded = content.get(&self.content_id)?;
        Ok(ResourceContents {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            text: loaded.text,
        })
    }
}

/// Result of `resources/list`.
#[derive(Debug, Serialize)]
pub struct ResourceList {
    resources: Vec<ResourceInfo>,
}

#[derive(Debug, Serialize)]
struct ResourceInfo {
    uri: String,
    name: String,
    description: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

/// One entry of a `resources/read` result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

/// Result of `resources/read`.
#[derive(Debug, Serialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

/// Collects resources before serving starts.
#[derive(Debug, Default)]
pub struct ResourceRegistryBuilder {
    resources: Vec<ResourceDescriptor>,
    index: HashMap<String, usize>,
}

impl ResourceRegistryBuilder {
    /// Adds a resource. A repeated URI is [`RegistryError::DuplicateResource`].
    pub fn register(&mut self, descriptor: ResourceDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.uri) {
            return Err(RegistryError::DuplicateResource(descriptor.uri));
        }
        self.index.insert(descriptor.uri.clone(), self.resources.len());
        self.resources.push(descriptor);
        Ok(())
    }

    pub fn build(self) -> ResourceRegistry {
        ResourceRegistry {
            resources: self.resources,
            index: self.index,
        }
    }
}

/// Immutable URI → resource table, in registration order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
    index: HashMap<String, usize>,
}

impl ResourceRegistry {
    pub fn builder() -> ResourceRegistryBuilder {
        ResourceRegistryBuilder::default()
    }

    pub fn lookup(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.index.get(uri).map(|i| &self.resources[*i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn list(&self) -> ResourceList {
        ResourceList {
            resources: self
                .resources
                .iter()
                .map(|r| ResourceInfo {
                    uri: r.uri.clone(),
                    name: r.name.clone(),
                    description: r.description.clone(),
                    mime_type: r.mime_type.clone(),
                })
                .collect(),
        }
    }
}
