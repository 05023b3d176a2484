//! Backend wire formats for tool definitions.

use crate::ToolDefinition;

/// Convert a tool definition to a Gemini `functionDeclarations` entry.
///
/// Gemini rejects an empty `properties` object, so parameterless tools are
/// declared without a schema.
pub fn to_gemini_tool(tool: &ToolDefinition) -> serde_json::Value {
    let has_params = tool.parameters["properties"]
        .as_object()
        .is_some_and(|props| !props.is_empty());

    if has_params {
        serde_json::json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        })
    } else {
        serde_json::json!({
            "name": tool.name,
            "description": tool.description,
        })
    }
}
