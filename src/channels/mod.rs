//! Channel abstraction for message I/O.
//!
//! The dialogue only needs three outbound primitives (send, edit, send a
//! file), expressed by `ChatTransport`. `Channel` adds the inbound stream and
//! a startup health check for the concrete transports.

pub mod cli;
pub mod telegram;

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

pub use cli::CliChannel;
pub use telegram::TelegramChannel;

/// Stream of inbound messages produced by a running channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// An inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Channel that produced the message.
    pub channel: String,
    /// Stable key of the conversation (the chat, not the sender).
    pub conversation_id: String,
    pub text: String,
    /// Display name of the sender, for logging.
    pub user_name: Option<String>,
}

impl IncomingMessage {
    pub fn new(channel: &str, conversation_id: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            user_name: None,
        }
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }
}

/// A URL button attached below a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(text: &str, url: &str) -> Self {
        Self {
            text: text.to_string(),
            url: url.to_string(),
        }
    }
}

/// An outbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    /// Rendered as a single row of URL buttons.
    pub links: Vec<LinkButton>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Vec<LinkButton>) -> Self {
        self.links = links;
        self
    }
}

/// Identifies a sent message so it can be edited later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub conversation_id: String,
    pub message_id: String,
}

/// Outbound primitives used by the dialogue controller.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Channel name for logs.
    fn name(&self) -> &str;

    async fn send_message(
        &self,
        conversation_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, ChannelError>;

    /// Replace the text of a previously sent message.
    async fn edit_message(&self, handle: &MessageHandle, text: &str) -> Result<(), ChannelError>;

    /// Send the file at `path` as an attachment named `file_name`.
    async fn send_document(
        &self,
        conversation_id: &str,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ChannelError>;
}

/// A transport that can also receive messages.
#[async_trait]
pub trait Channel: ChatTransport {
    /// Start receiving. The returned stream ends when the channel stops.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;
}
