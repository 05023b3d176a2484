//! Scripted backend and recording host shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::confirm::PendingAction;
use crate::host::{Delivery, DeliveryError, HostChannel};
use crate::tools::{AttachmentSource, FnTool, ToolError, ToolInput, ToolOutput};
use crate::{
    AiClient, AiError, AiResponse, GenerationConfig, Message, ToolCall, ToolDefinition,
    TokenUsage,
};

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<AiResponse, AiError>>>,
    pub(crate) requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn text(self, content: &str) -> Self {
        self.push(Ok(AiResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        }))
    }

    pub(crate) fn call(self, name: &str, arguments: Value) -> Self {
        self.calls(vec![(name, arguments)])
    }

    pub(crate) fn calls(self, calls: Vec<(&str, Value)>) -> Self {
        self.push(Ok(AiResponse {
            content: String::new(),
            tool_calls: calls
                .into_iter()
                .map(|(name, args)| ToolCall::new(name, args))
                .collect(),
            usage: TokenUsage::default(),
        }))
    }

    pub(crate) fn error(self, err: AiError) -> Self {
        self.push(Err(err))
    }

    fn push(self, response: Result<AiResponse, AiError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> Vec<Message> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AiClient for ScriptedClient {
    async fn send_message(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _generation: &GenerationConfig,
    ) -> Result<AiResponse, AiError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::ApiError("script exhausted".into())))
    }
}

/// A delivered message with file contents captured at delivery time.
#[derive(Debug, Clone)]
pub(crate) struct RecordedDelivery {
    pub(crate) text: String,
    pub(crate) files: Vec<RecordedFile>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedFile {
    pub(crate) display_name: String,
    pub(crate) contents: Vec<u8>,
    pub(crate) path: Option<std::path::PathBuf>,
}

#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) progress: Mutex<Vec<String>>,
    pub(crate) deliveries: Mutex<Vec<RecordedDelivery>>,
    pub(crate) confirmations: Mutex<Vec<PendingAction>>,
    pub(crate) fail_deliveries: bool,
    /// Refuse any delivery that carries files.
    pub(crate) reject_files: bool,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_deliveries: true,
            ..Self::default()
        }
    }

    pub(crate) fn rejecting_files() -> Self {
        Self {
            reject_files: true,
            ..Self::default()
        }
    }

    pub(crate) fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostChannel for RecordingHost {
    async fn send_or_edit_progress(&self, content: &str) -> Result<(), DeliveryError> {
        self.progress.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn deliver(&self, delivery: Delivery) -> Result<(), DeliveryError> {
        if self.reject_files && !delivery.files.is_empty() {
            return Err(DeliveryError::Attachment("file too large".into()));
        }
        let mut files = Vec::new();
        for file in delivery.files {
            let (contents, path) = match file.source {
                AttachmentSource::Bytes(bytes) => (bytes, None),
                AttachmentSource::Path(path) => (std::fs::read(&path)?, Some(path)),
            };
            files.push(RecordedFile {
                display_name: file.display_name,
                contents,
                path,
            });
        }
        self.deliveries.lock().unwrap().push(RecordedDelivery {
            text: delivery.text,
            files,
        });
        if self.fail_deliveries {
            return Err(DeliveryError::Unavailable("channel closed".into()));
        }
        Ok(())
    }

    async fn request_confirmation(&self, action: &PendingAction) -> Result<(), DeliveryError> {
        self.confirmations.lock().unwrap().push(action.clone());
        Ok(())
    }
}

pub(crate) fn definition(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: format!("test tool {name}"),
        parameters: json!({ "type": "object", "properties": {} }),
    }
}

/// Tool that records each input it receives and answers with `value`.
pub(crate) fn recording_tool(
    name: &str,
    value: Value,
    log: Arc<Mutex<Vec<(String, ToolInput)>>>,
) -> FnTool {
    let tool_name = name.to_string();
    FnTool::new(definition(name), move |input| {
        let log = log.clone();
        let tool_name = tool_name.clone();
        let value = value.clone();
        async move {
            log.lock().unwrap().push((tool_name, input));
            Ok(ToolOutput::new(value))
        }
    })
}

/// Tool that always fails with `message`.
pub(crate) fn failing_tool(name: &str, message: &str) -> FnTool {
    let message = message.to_string();
    FnTool::new(definition(name), move |_input| {
        let message = message.clone();
        async move { Err(ToolError::Failed(message)) }
    })
}

/// Tool whose result carries an attachment the model must never see.
pub(crate) fn attaching_tool(name: &str, file_name: &str, bytes: &[u8]) -> FnTool {
    let file_name = file_name.to_string();
    let bytes = bytes.to_vec();
    FnTool::new(definition(name), move |_input| {
        let file_name = file_name.clone();
        let bytes = bytes.clone();
        async move {
            Ok(ToolOutput::new(json!({ "status": "rendered" }))
                .with_attachment(crate::tools::Attachment::from_bytes(bytes, file_name)))
        }
    })
}
