//! Dialogue controller — runs transitions and the plan pipeline.
//!
//! One `Conversation` is owned by exactly one worker task (see
//! `crate::dispatch`), so the controller takes it by `&mut` and never locks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{ChatTransport, MessageHandle, OutgoingMessage};
use crate::document::PlanDocument;
use crate::error::{GenerationError, RenderError};
use crate::generation::{GenerationStage, ProgressSink, TextGenerator};
use crate::plan::parse_rows;
use crate::session::{CompletedSession, Session};

use super::messages;
use super::state::{DialogueState, Effect, Event, Transition, transition};

/// State of one conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub id: String,
    pub state: DialogueState,
    pub session: Session,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Terminated without a complete session: nothing a later `/reset` could
    /// use, so the conversation is indistinguishable from a fresh one.
    pub fn is_idle(&self) -> bool {
        self.state.is_terminal() && !self.session.is_complete()
    }
}

/// How a pipeline run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The plan was sent to the user.
    Delivered { file_name: String, rows: usize },
    /// Probe or generation failed; nothing was rendered.
    GenerationFailed(GenerationError),
    /// Rendering or delivery failed after a successful generation.
    DeliveryFailed(String),
    /// The session lacked a field.
    IncompleteSession,
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Drives conversations against a transport and a generator.
pub struct Controller {
    transport: Arc<dyn ChatTransport>,
    generator: Arc<dyn TextGenerator>,
}

impl Controller {
    pub fn new(transport: Arc<dyn ChatTransport>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            transport,
            generator,
        }
    }

    /// Process one inbound message to completion.
    ///
    /// Returns the pipeline outcome when the message triggered a generation.
    pub async fn handle(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Option<PipelineOutcome> {
        let from = conversation.state;
        let Transition { next, effects } =
            transition(from, Event::parse(text), &mut conversation.session);

        if effects.is_empty() {
            tracing::debug!(conversation = %conversation.id, state = %from, "Message ignored");
            return None;
        }
        if from != next {
            tracing::info!(
                conversation = %conversation.id,
                from = %from,
                to = %next,
                "Dialogue transition"
            );
        }
        conversation.state = next;

        let mut outcome = None;
        for effect in effects {
            match effect {
                Effect::Reply(message) => self.say(&conversation.id, message).await,
                Effect::RunPipeline => {
                    let result = self
                        .run_pipeline(&conversation.id, &conversation.session)
                        .await;
                    outcome = Some(result);
                }
            }
        }
        outcome
    }

    /// Generate, render and deliver a plan for a complete session.
    pub async fn run_pipeline(&self, conversation_id: &str, session: &Session) -> PipelineOutcome {
        let Some(session) = session.completed() else {
            self.say(conversation_id, OutgoingMessage::text(messages::NO_SAVED_DATA))
                .await;
            return PipelineOutcome::IncompleteSession;
        };

        let mut status = StatusMessage::new(self.transport.as_ref(), conversation_id);
        let text = match self.generator.generate(&session.goal, &mut status).await {
            Ok(text) => text,
            Err(e) => {
                self.say(conversation_id, OutgoingMessage::text(messages::GENERATION_FAILED))
                    .await;
                return PipelineOutcome::GenerationFailed(e);
            }
        };

        self.say(conversation_id, OutgoingMessage::text(messages::CREATING_DOCUMENT))
            .await;
        match self.deliver(conversation_id, &session, &text).await {
            Ok(outcome) => {
                self.say(conversation_id, OutgoingMessage::text(messages::DONE))
                    .await;
                outcome
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation_id, error = %e, "Plan delivery failed");
                self.say(
                    conversation_id,
                    OutgoingMessage::text(messages::unexpected_error(&e.to_string())),
                )
                .await;
                PipelineOutcome::DeliveryFailed(e.to_string())
            }
        }
    }

    /// Parse, render, write to a temporary file, send it, delete it.
    async fn deliver(
        &self,
        conversation_id: &str,
        session: &CompletedSession,
        text: &str,
    ) -> crate::error::Result<PipelineOutcome> {
        let rows = parse_rows(text);
        let document = PlanDocument::render(session, &rows);

        let dir = tempfile::tempdir().map_err(RenderError::from)?;
        let path = document.write_transient(dir.path()).await?;

        self.say(conversation_id, OutgoingMessage::text(messages::SENDING_FILE))
            .await;
        let sent = self
            .transport
            .send_document(conversation_id, &path, &document.file_name)
            .await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove plan file");
        }
        sent?;

        tracing::info!(
            conversation = %conversation_id,
            file = %document.file_name,
            rows = rows.len(),
            "Plan delivered"
        );
        Ok(PipelineOutcome::Delivered {
            file_name: document.file_name,
            rows: rows.len(),
        })
    }

    /// Send a message; transport failures are logged, not propagated.
    async fn say(&self, conversation_id: &str, message: OutgoingMessage) {
        if let Err(e) = self.transport.send_message(conversation_id, message).await {
            tracing::warn!(
                channel = self.transport.name(),
                conversation = %conversation_id,
                error = %e,
                "Failed to send reply"
            );
        }
    }
}

/// Shows generation progress as one message that is posted on the first
/// stage and edited afterwards.
struct StatusMessage<'a> {
    transport: &'a dyn ChatTransport,
    conversation_id: &'a str,
    handle: Option<MessageHandle>,
}

impl<'a> StatusMessage<'a> {
    fn new(transport: &'a dyn ChatTransport, conversation_id: &'a str) -> Self {
        Self {
            transport,
            conversation_id,
            handle: None,
        }
    }
}

#[async_trait]
impl<'a> ProgressSink for StatusMessage<'a> {
    async fn report(&mut self, stage: GenerationStage) {
        let text = stage.status_text();
        let result = match self.handle.clone() {
            Some(handle) => self.transport.edit_message(&handle, &text).await,
            None => {
                let sent = self
                    .transport
                    .send_message(self.conversation_id, OutgoingMessage::text(text))
                    .await;
                sent.map(|handle| self.handle = Some(handle))
            }
        };
        if let Err(e) = result {
            tracing::warn!(
                conversation = %self.conversation_id,
                error = %e,
                "Failed to update status"
            );
        }
    }
}
