//! Reference content served by the tools.
//!
//! Handlers never touch the filesystem directly; they ask a [`ContentProvider`]
//! for a content identifier such as `payloads/v3/vrf.json`. Identifiers are
//! relative, `/`-separated paths. A leading `./` is accepted and ignored.
//!
//! Three providers are available:
//!
//! - [`EmbeddedContent`]: the reference files compiled into the binary.
//! - [`DirectoryContent`]: files under a root directory.
//! - [`LayeredContent`]: asks each layer in turn, moving on only when a layer
//!   does not have the identifier.

use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// A piece of reference content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub id: String,
    pub text: String,
}

impl Content {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Content {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Parses the content as JSON.
    pub fn json(&self) -> Result<Value, ContentError> {
        serde_json::from_str(&self.text).map_err(|source| ContentError::Json {
            id: self.id.clone(),
            source,
        })
    }

    /// MIME type guessed from the identifier's extension.
    pub fn mime_type(&self) -> &'static str {
        mime_type_for(&self.id)
    }
}

/// MIME type implied by an identifier's extension. Unknown extensions are
/// `text/plain`.
pub fn mime_type_for(id: &str) -> &'static str {
    match Path::new(id).extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        _ => "text/plain",
    }
}

/// Why content could not be supplied. Tools report these as `HandlerError`.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content '{id}' not found")]
    NotFound { id: String },
    #[error("content identifier '{id}' is not a relative path inside the content root")]
    InvalidIdentifier { id: String },
    #[error("failed to read content '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("content '{id}' is not valid JSON: {source}")]
    Json {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of reference content.
pub trait ContentProvider: Send + Sync {
    fn get(&self, id: &str) -> Result<Content, ContentError>;

    /// Short description for startup logs.
    fn describe(&self) -> String;
}

/// Validates an identifier and strips a leading `./`.
fn normalize(id: &str) -> Result<&str, ContentError> {
    let trimmed = id.strip_prefix("./").unwrap_or(id);
    let invalid = || ContentError::InvalidIdentifier { id: id.to_string() };
    if trimmed.is_empty() {
        return Err(invalid());
    }
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(invalid()),
        }
    }
    Ok(trimmed)
}

static EMBEDDED: &[(&str, &str)] = &[
    (
        "payloads/v3/vrf.json",
        include_str!("../content/payloads/v3/vrf.json"),
    ),
    (
        "payloads/v3/md/vrf.md",
        include_str!("../content/payloads/v3/md/vrf.md"),
    ),
    (
        "payloads/v3/md/vrf_attachment.md",
        include_str!("../content/payloads/v3/md/vrf_attachment.md"),
    ),
    (
        "responses/v3/vrf_attachments.json",
        include_str!("../content/responses/v3/vrf_attachments.json"),
    ),
    (
        "prompts/ansible_developer_role.md",
        include_str!("../content/prompts/ansible_developer_role.md"),
    ),
];

/// Content compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedContent;

impl EmbeddedContent {
    pub fn ids(&self) -> impl Iterator<Item = &'static str> {
        EMBEDDED.iter().map(|(id, _)| *id)
    }
}

impl ContentProvider for EmbeddedContent {
    fn get(&self, id: &str) -> Result<Content, ContentError> {
        let key = normalize(id)?;
        EMBEDDED
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(candidate, text)| Content::new(*candidate, *text))
            .ok_or_else(|| ContentError::NotFound { id: id.to_string() })
    }

    fn describe(&self) -> String {
        format!("embedded ({} files)", EMBEDDED.len())
    }
}

/// Content read from files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryContent {
    root: PathBuf,
}

impl DirectoryContent {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryContent { root: root.into() }
    }
}

impl ContentProvider for DirectoryContent {
    fn get(&self, id: &str) -> Result<Content, ContentError> {
        let key = normalize(id)?;
        let path = self.root.join(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Content::new(key, text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ContentError::NotFound { id: id.to_string() })
            }
            Err(source) => Err(ContentError::Io {
                id: id.to_string(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// Consults each layer in order. Only [`ContentError::NotFound`] falls
/// through to the next layer; any other failure is returned as-is.
pub struct LayeredContent {
    layers: Vec<Box<dyn ContentProvider>>,
}

impl LayeredContent {
    pub fn new(layers: Vec<Box<dyn ContentProvider>>) -> Self {
        LayeredContent { layers }
    }
}

impl ContentProvider for LayeredContent {
    fn get(&self, id: &str) -> Result<Content, ContentError> {
        for layer in &self.layers {
            match layer.get(id) {
                Err(ContentError::NotFound { .. }) => continue,
                other => return other,
            }
        }
        Err(ContentError::NotFound { id: id.to_string() })
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.layers.iter().map(|l| l.describe()).collect();
        parts.join(" > ")
    }
}
