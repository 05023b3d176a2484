//! Gemini API client struct, request building, and response parsing.

use serde_json::{json, Value};

use crate::tools::to_gemini_tool;
use crate::{
    AiError, AiResponse, GenerationConfig, Message, Role, TokenUsage, ToolCall, ToolDefinition,
};

use super::config::GeminiConfig;

/// Gemini API client.
pub struct GeminiClient {
    pub(crate) config: GeminiConfig,
    pub(crate) http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::NetworkError(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub(crate) fn api_url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the JSON request body for the Gemini API.
    ///
    /// Consecutive turns with the same Gemini role are merged into one
    /// content, so a batch of tool results becomes a single user turn.
    pub(crate) fn build_request_body(
        messages: &[Message],
        tools: &[ToolDefinition],
        generation: &GenerationConfig,
    ) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system: Option<&str> = None;

        for msg in messages {
            let (role, parts) = match msg.role {
                Role::System => {
                    system.get_or_insert(msg.content.as_str());
                    continue;
                }
                Role::User => ("user", vec![json!({ "text": msg.content })]),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({ "text": msg.content }));
                    }
                    for call in &msg.tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": call.name, "args": call.arguments }
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(json!({ "text": "" }));
                    }
                    ("model", parts)
                }
                Role::Tool => {
                    let Some(result) = &msg.tool_result else {
                        continue;
                    };
                    let response = match &result.value {
                        Value::Object(_) => result.value.clone(),
                        other => json!({ "result": other }),
                    };
                    (
                        "user",
                        vec![json!({
                            "functionResponse": { "name": result.name, "response": response }
                        })],
                    )
                }
            };

            match contents.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(existing) = last["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                _ => contents.push(json!({ "role": role, "parts": parts })),
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": generation.max_output_tokens,
                "temperature": generation.temperature,
                "topP": generation.top_p,
            }
        });

        if let Some(instruction) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }

        if !tools.is_empty() {
            let tool_defs: Vec<_> = tools.iter().map(to_gemini_tool).collect();
            body["tools"] = json!([{ "functionDeclarations": tool_defs }]);
        }

        body
    }

    /// Parse a Gemini response.
    pub(crate) fn parse_response(json: Value) -> Result<AiResponse, AiError> {
        let candidates = json["candidates"]
            .as_array()
            .ok_or_else(|| AiError::ParseError("no candidates in response".to_string()))?;

        let first = candidates
            .first()
            .ok_or_else(|| AiError::ParseError("empty candidates".to_string()))?;

        let parts = first["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for part in &parts {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(fc) = part.get("functionCall") {
                let Some(name) = fc["name"].as_str().filter(|n| !n.is_empty()) else {
                    continue;
                };
                let args = match &fc["args"] {
                    Value::Null => json!({}),
                    other => other.clone(),
                };
                tool_calls.push(ToolCall::new(name, args));
            }
        }

        let usage = TokenUsage {
            input_tokens: json["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0),
            output_tokens: json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
        };

        Ok(AiResponse {
            content,
            tool_calls,
            usage,
        })
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
