//! The `Tool` trait and the values that flow through it.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::{Map, Value};
use warden_common::UserId;

use crate::ToolDefinition;

/// Error value fed back to the model when it names a tool nobody registered.
pub const UNKNOWN_FUNCTION: &str = "Unknown function";

/// A named capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;
}

/// What a tool receives, decided by argument preparation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// The model sent no arguments; the tool is keyed by the requester alone.
    Identity(UserId),
    /// Model arguments merged with the requester's identity and location.
    Args(Map<String, Value>),
    /// The raw platform message, for tools acting on the live conversation.
    Message(Value),
}

impl ToolInput {
    /// The argument map, if this input carries one.
    pub fn args(&self) -> Option<&Map<String, Value>> {
        match self {
            ToolInput::Args(map) => Some(map),
            _ => None,
        }
    }
}

/// Result of a tool: a model-visible value plus out-of-band attachments.
///
/// Only `value` is ever turned into a conversation turn.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub value: Value,
    pub attachments: Vec<Attachment>,
}

impl ToolOutput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            attachments: Vec::new(),
        }
    }

    /// `{ "error": message }`, the shape the model is told to expect.
    pub fn error(message: impl fmt::Display) -> Self {
        Self::new(serde_json::json!({ "error": message.to_string() }))
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_error(&self) -> bool {
        self.value.get("error").is_some()
    }

    /// Split into the model-visible value and the side-channel files.
    pub fn into_parts(self) -> (Value, Vec<Attachment>) {
        (self.value, self.attachments)
    }
}

/// A file produced by a tool for the human, never shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub source: AttachmentSource,
    pub display_name: String,
}

impl Attachment {
    pub fn from_path(path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            source: AttachmentSource::Path(path.into()),
            display_name: display_name.into(),
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, display_name: impl Into<String>) -> Self {
        Self {
            source: AttachmentSource::Bytes(bytes.into()),
            display_name: display_name.into(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub enum AttachmentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            AttachmentSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send>>;

type Handler = Box<dyn Fn(ToolInput) -> ToolFuture + Send + Sync>;

/// A tool backed by a closure, for late-bound and host-provided handlers.
pub struct FnTool {
    definition: ToolDefinition,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        Self {
            definition,
            handler: Box::new(move |input| Box::pin(handler(input))),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        (self.handler)(input).await
    }
}
