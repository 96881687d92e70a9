//! Telegram channel — long-polls the Bot API for updates.
//!
//! Talks to the Bot API directly over `reqwest`: `getUpdates` for inbound
//! text, `sendMessage`/`editMessageText` for replies and status lines,
//! multipart `sendDocument` for the generated plan.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{
    Channel, ChatTransport, IncomingMessage, LinkButton, MessageHandle, MessageStream,
    OutgoingMessage,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Seconds `getUpdates` holds the connection open.
const LONG_POLL_SECS: u64 = 30;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.bot_token.expose_secret()
        )
    }

    fn send_error(reason: impl Into<String>) -> ChannelError {
        ChannelError::SendFailed {
            name: "telegram".into(),
            reason: reason.into(),
        }
    }

    /// POST a JSON body to a Bot API method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            // The token is part of the URL.
            .map_err(|e| Self::send_error(e.without_url().to_string()))?;
        api_result(method, resp).await
    }

    /// Send one chunk (≤4096 chars) and return its message id.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        links: &[LinkButton],
    ) -> Result<String, ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if !links.is_empty() {
            body["reply_markup"] = inline_keyboard(links);
        }

        let result = self.call("sendMessage", &body).await?;
        result
            .get("message_id")
            .and_then(serde_json::Value::as_i64)
            .map(|id| id.to_string())
            .ok_or_else(|| Self::send_error("sendMessage response has no message_id"))
    }
}

// ── Transport implementation ────────────────────────────────────────

#[async_trait]
impl ChatTransport for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Splits long messages; buttons go on the last chunk, whose id is
    /// returned.
    async fn send_message(
        &self,
        conversation_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, ChannelError> {
        let chunks = split_message(&message.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        let mut message_id = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let links: &[LinkButton] = if i == last { &message.links } else { &[] };
            message_id = self.send_message_chunk(conversation_id, chunk, links).await?;
        }

        Ok(MessageHandle {
            conversation_id: conversation_id.to_string(),
            message_id,
        })
    }

    async fn edit_message(&self, handle: &MessageHandle, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": handle.conversation_id,
            "message_id": handle.message_id.parse::<i64>().map_err(|_| {
                ChannelError::InvalidMessage(format!("bad message id {}", handle.message_id))
            })?,
            "text": text,
        });
        self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        conversation_id: &str,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ChannelError> {
        let file_bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Self::send_error(format!("cannot read {}: {e}", path.display())))?;
        let part = Part::bytes(file_bytes).file_name(file_name.to_string());

        let form = Form::new()
            .text("chat_id", conversation_id.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::send_error(e.without_url().to_string()))?;
        api_result("sendDocument", resp).await?;

        tracing::info!("Telegram document sent to {conversation_id}: {file_name}");
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": LONG_POLL_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    tracing::warn!(
                        description = ?data.get("description"),
                        "Telegram getUpdates returned no result"
                    );
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Check the Bot API envelope `{ok, result, description}`.
async fn api_result(
    method: &str,
    resp: reqwest::Response,
) -> Result<serde_json::Value, ChannelError> {
    let status = resp.status();
    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| ChannelError::Http(format!("{method}: {}", e.without_url())))?;

    let ok = data.get("ok").and_then(serde_json::Value::as_bool).unwrap_or(false);
    if !status.is_success() || !ok {
        let description = data
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("no description");
        return Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("{method} failed ({status}): {description}"),
        });
    }

    Ok(data.get("result").cloned().unwrap_or(serde_json::Value::Null))
}

/// Turn one `getUpdates` entry into an inbound message. Non-text updates
/// yield `None`.
fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let from = message.get("from");
    let display_name = from
        .and_then(|f| f.get("first_name"))
        .or_else(|| from.and_then(|f| f.get("username")))
        .and_then(|n| n.as_str());

    let mut incoming = IncomingMessage::new("telegram", &chat_id.to_string(), text);
    if let Some(name) = display_name {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// `reply_markup` with one row of URL buttons.
fn inline_keyboard(links: &[LinkButton]) -> serde_json::Value {
    let row: Vec<serde_json::Value> = links
        .iter()
        .map(|l| serde_json::json!({ "text": l.text, "url": l.url }))
        .collect();
    serde_json::json!({ "inline_keyboard": [row] })
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char
/// boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Byte offset of the first char past the limit
        let limit = remaining
            .char_indices()
            .nth(max_len)
            .map_or(remaining.len(), |(i, _)| i);
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(SecretString::from("123:ABC"))
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel().name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel().api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn telegram_api_url_custom_base() {
        let ch = channel().with_api_base("http://127.0.0.1:8081/");
        assert_eq!(
            ch.api_url("sendDocument"),
            "http://127.0.0.1:8081/bot123:ABC/sendDocument"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parse_text_update() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "first_name": "Анна", "username": "anna"},
                "chat": {"id": -100500, "type": "private"},
                "text": "/start"
            }
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.conversation_id, "-100500");
        assert_eq!(msg.text, "/start");
        assert_eq!(msg.user_name.as_deref(), Some("Анна"));
    }

    #[test]
    fn parse_update_falls_back_to_username() {
        let update = serde_json::json!({
            "message": {"from": {"id": 1, "username": "bob"}, "chat": {"id": 1}, "text": "hi"}
        });
        assert_eq!(parse_update(&update).unwrap().user_name.as_deref(), Some("bob"));
    }

    #[test]
    fn parse_update_skips_non_text() {
        let sticker = serde_json::json!({
            "message": {"chat": {"id": 1}, "sticker": {"file_id": "x"}}
        });
        assert!(parse_update(&sticker).is_none());
        assert!(parse_update(&serde_json::json!({"edited_message": {}})).is_none());
    }

    #[test]
    fn parse_update_requires_chat() {
        let update = serde_json::json!({"message": {"text": "hi"}});
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn keyboard_is_single_row() {
        let kb = inline_keyboard(&[
            LinkButton::new("GitHub", "https://github.com/x"),
            LinkButton::new("Telegram", "https://t.me/x"),
        ]);
        assert_eq!(kb["inline_keyboard"].as_array().unwrap().len(), 1);
        assert_eq!(kb["inline_keyboard"][0][1]["url"], "https://t.me/x");
    }

    // ── Network error tests (expected to fail with no server) ───────

    #[tokio::test]
    async fn send_document_nonexistent_file() {
        let ch = channel();
        let result = ch
            .send_document("123456", Path::new("/nonexistent/plan.docx"), "plan.docx")
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("cannot read"), "Expected file error, got: {err}");
    }

    #[tokio::test]
    async fn edit_rejects_non_numeric_id() {
        let handle = MessageHandle {
            conversation_id: "1".into(),
            message_id: "abc".into(),
        };
        let err = channel().edit_message(&handle, "x").await.unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn send_error_does_not_leak_token() {
        let ch = channel().with_api_base("http://127.0.0.1:9");
        let err = ch
            .send_message("1", OutgoingMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("123:ABC"));
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks, vec!["a".repeat(2000), "b".repeat(3000)]);
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_counts_chars_not_bytes() {
        // Cyrillic letters are two bytes each.
        let msg = "я".repeat(3000);
        assert_eq!(split_message(&msg, 4096).len(), 1);

        let msg = "я".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks[0].chars().count(), 4096);
        assert_eq!(chunks[1].chars().count(), 904);
    }
}
