//! CLI channel — stdin/stdout REPL for local testing.
//!
//! The whole terminal is one conversation. Documents are not opened; the
//! channel prints their name and size.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    Channel, ChatTransport, IncomingMessage, MessageHandle, MessageStream, OutgoingMessage,
};
use crate::error::ChannelError;

/// Conversation key used for every CLI message.
pub const CLI_CONVERSATION: &str = "local";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    next_message_id: AtomicU64,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(1),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, ChannelError> {
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        println!("\n{}", message.text);
        for link in &message.links {
            println!("   [{}] {}", link.text, link.url);
        }
        Ok(MessageHandle {
            conversation_id: conversation_id.to_string(),
            message_id: id.to_string(),
        })
    }

    async fn edit_message(&self, handle: &MessageHandle, text: &str) -> Result<(), ChannelError> {
        println!("\n✏️  (#{}) {}", handle.message_id, text);
        Ok(())
    }

    async fn send_document(
        &self,
        _conversation_id: &str,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ChannelError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "cli".into(),
                reason: format!("cannot read {}: {e}", path.display()),
            })?;
        println!("\n📎 {} ({} bytes)", file_name, meta.len());
        Ok(())
    }
}

#[async_trait]
impl Channel for CliChannel {
    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", CLI_CONVERSATION, &line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
