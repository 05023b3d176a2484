//! Tool capability registry.
//!
//! Tools are capabilities the model can call by name. Built-in tools are
//! registered once in a global [`ToolRegistry`]; hosts can also attach
//! session-local overrides to a single conversation.

mod definitions;
mod registry;
mod types;

pub use definitions::to_gemini_tool;
pub use registry::ToolRegistry;
pub use types::{
    Attachment, AttachmentSource, FnTool, Tool, ToolError, ToolFuture, ToolInput, ToolOutput,
    UNKNOWN_FUNCTION,
};

#[cfg(test)]
mod tests;
