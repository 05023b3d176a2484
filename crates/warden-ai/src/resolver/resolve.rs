//! The resolution loop.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{args::prepare_input, fallback, FinalOutcome, RequestContext, ResolverOptions};
use crate::confirm::PendingAction;
use crate::host::HostChannel;
use crate::session::ConversationSession;
use crate::tools::{Attachment, ToolInput, ToolOutput, ToolRegistry, UNKNOWN_FUNCTION};
use crate::{AiClient, AiError, Message, ToolCall};

const CONFIRMATION_REQUIRED: &str = "This action needs the user's confirmation. A confirm/cancel \
     prompt has been shown to them; do not call the tool again.";
const SKIPPED_FOR_CONFIRMATION: &str = "Skipped: awaiting confirmation";
const ROUND_LIMIT_REACHED: &str = "Tool call limit reached for this message";

/// Runs the send → execute tools → feed back loop for one session.
#[derive(Debug, Clone)]
pub struct ToolCallResolver {
    options: ResolverOptions,
    registry: Arc<ToolRegistry>,
}

/// What executing one batch of calls produced.
enum Batch {
    /// Results to send back to the model.
    Results(Vec<Message>),
    /// A gated call stopped the batch; results are recorded, not sent.
    Gated(Vec<Message>, PendingAction),
}

impl ToolCallResolver {
    pub fn new(options: ResolverOptions, registry: Arc<ToolRegistry>) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Send `turn` and keep executing requested tools until the model
    /// answers in plain text.
    ///
    /// Tool failures are fed back to the model; only backend errors escape.
    /// A backend error mid-cycle discards every turn this call recorded, so
    /// the history never ends on unanswered tool calls.
    pub async fn resolve(
        &self,
        session: &mut ConversationSession,
        client: &dyn AiClient,
        turn: Vec<Message>,
        ctx: &RequestContext,
        host: &dyn HostChannel,
    ) -> Result<FinalOutcome, AiError> {
        let mut attachments: Vec<Attachment> = Vec::new();
        let mut rounds = 0u32;
        let mut outgoing = turn;
        let start = session.history().len();

        loop {
            let response = match session.send(client, outgoing).await {
                Ok(response) => response,
                Err(e) => {
                    if session.history().len() > start {
                        warn!(
                            user = %ctx.user,
                            round = rounds,
                            error = %e,
                            "Backend failed mid-cycle, discarding partial exchange"
                        );
                    }
                    session.rollback_to(start);
                    return Err(e);
                }
            };
            let mut text = response.content;
            let mut calls = response.tool_calls;

            if calls.is_empty() {
                if let Some(parsed) = fallback::extract(&text) {
                    debug!(
                        user = %ctx.user,
                        calls = parsed.calls.len(),
                        "Parsed inline tool-call syntax"
                    );
                    text = parsed.remaining;
                    calls = parsed.calls;
                    if let Some(last) = session.last_assistant_mut() {
                        last.content = text.clone();
                        last.tool_calls = calls.clone();
                    }
                }
            }

            if calls.is_empty() {
                return Ok(FinalOutcome {
                    text,
                    attachments,
                    rounds,
                    confirmation: None,
                });
            }

            if rounds >= self.options.max_tool_rounds {
                warn!(
                    user = %ctx.user,
                    round = rounds,
                    "Max tool rounds reached, returning current text"
                );
                // Answer the dangling calls so the history stays well-formed.
                session.record(calls.iter().map(|call| {
                    Message::tool_result(call, ToolOutput::error(ROUND_LIMIT_REACHED).value)
                }));
                return Ok(FinalOutcome {
                    text,
                    attachments,
                    rounds,
                    confirmation: None,
                });
            }
            rounds += 1;

            let batch = self
                .execute_batch(session, &calls, ctx, host, rounds, &mut attachments)
                .await;
            match batch {
                Batch::Results(results) => outgoing = results,
                Batch::Gated(results, action) => {
                    session.record(results);
                    return Ok(FinalOutcome {
                        text,
                        attachments,
                        rounds,
                        confirmation: Some(action),
                    });
                }
            }
        }
    }

    async fn execute_batch(
        &self,
        session: &ConversationSession,
        calls: &[ToolCall],
        ctx: &RequestContext,
        host: &dyn HostChannel,
        round: u32,
        attachments: &mut Vec<Attachment>,
    ) -> Batch {
        let mut results = Vec::with_capacity(calls.len());
        let mut gated: Option<PendingAction> = None;

        for call in calls {
            let value = if gated.is_some() {
                ToolOutput::error(SKIPPED_FOR_CONFIRMATION).value
            } else if self.options.confirmation_tools.contains(&call.name)
                && session.handler(&call.name, &self.registry).is_some()
            {
                info!(user = %ctx.user, tool = %call.name, "Tool requires confirmation");
                gated = Some(PendingAction::new(
                    session.key().clone(),
                    call.name.clone(),
                    self.prepare(call, ctx),
                ));
                ToolOutput::error(CONFIRMATION_REQUIRED).value
            } else {
                let (value, produced) = self.execute(session, call, ctx, host, round).await;
                attachments.extend(produced);
                value
            };
            results.push(Message::tool_result(call, value));
        }

        match gated {
            Some(action) => Batch::Gated(results, action),
            None => Batch::Results(results),
        }
    }

    async fn execute(
        &self,
        session: &ConversationSession,
        call: &ToolCall,
        ctx: &RequestContext,
        host: &dyn HostChannel,
        round: u32,
    ) -> (Value, Vec<Attachment>) {
        let Some(tool) = session.handler(&call.name, &self.registry) else {
            info!(user = %ctx.user, tool = %call.name, round, "Model called unknown tool");
            return (ToolOutput::error(UNKNOWN_FUNCTION).value, Vec::new());
        };

        if self.options.progress_notices && !ctx.suppress_progress {
            let notice = format!("Executing tool `{}`…", call.name);
            if let Err(e) = host.send_or_edit_progress(&notice).await {
                debug!(error = %e, "Progress notice failed");
            }
        }

        let input = self.prepare(call, ctx);
        debug!(user = %ctx.user, tool = %call.name, round, "Executing tool");
        match tool.execute(input).await {
            Ok(output) => output.into_parts(),
            Err(e) => {
                warn!(user = %ctx.user, tool = %call.name, error = %e, "Tool failed");
                (ToolOutput::error(e).value, Vec::new())
            }
        }
    }

    fn prepare(&self, call: &ToolCall, ctx: &RequestContext) -> ToolInput {
        prepare_input(
            &call.name,
            &call.arguments,
            ctx,
            &self.options.message_scoped_tools,
        )
    }
}
