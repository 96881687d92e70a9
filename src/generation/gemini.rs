//! Client for a Gemini-style `generateContent` endpoint.
//!
//! Every generation is preceded by a probe with a fixed throwaway payload so
//! a dead endpoint is reported as a connectivity problem, not a generation
//! problem. The cost is one extra request per plan.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{GenerationStage, ProgressSink, TextGenerator};
use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::plan::build_prompt;
use crate::plan::prompt::PROBE_PROMPT;

// ── Wire types ──────────────────────────────────────────────────────

/// Request and response body: `{contents:[{parts:[{text}]}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn from_text(text: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of `candidates[0].content.parts[0]`, if the whole path exists.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the generation endpoint.
#[derive(Debug)]
pub struct GeminiClient {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client and make sure the endpoint answers the probe before
    /// handing it out. Used as the startup pre-flight check.
    pub async fn connect(config: GenerationConfig) -> Result<Self, GenerationError> {
        let client = Self::new(config);
        let response = client.probe().await?;
        tracing::debug!(%response, "Probe response");
        Ok(client)
    }

    /// POST a body and return the raw response text.
    async fn post(
        &self,
        body: &GenerateContentRequest,
        timeout: Duration,
    ) -> Result<String, String> {
        let resp = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.expose_secret())])
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| describe(e, timeout))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| describe(e, timeout))?;
        if !status.is_success() {
            tracing::warn!(%status, body = %text, "Generation endpoint returned an error status");
            return Err(format!("HTTP {status}"));
        }
        Ok(text)
    }

    /// Send the fixed probe payload. Any answer other than a 2xx JSON body
    /// is a connectivity failure.
    pub async fn probe(&self) -> Result<serde_json::Value, GenerationError> {
        let body = GenerateContentRequest::from_text(PROBE_PROMPT);
        let text = self
            .post(&body, self.config.probe_timeout)
            .await
            .map_err(GenerationError::Connectivity)?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(body = %text, "Probe response is not JSON");
            GenerationError::Connectivity(format!("malformed probe response: {e}"))
        })
    }

    /// Send the real prompt and pull the text out of the envelope.
    async fn request(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateContentRequest::from_text(prompt);
        let text = self
            .post(&body, self.config.generate_timeout)
            .await
            .map_err(GenerationError::Request)?;
        tracing::debug!(body = %text, "Generation response");

        let envelope: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Request(format!("invalid JSON: {e}")))?;
        envelope
            .first_text()
            .map(str::to_string)
            .ok_or(GenerationError::InvalidFormat)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        goal: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<String, GenerationError> {
        progress.report(GenerationStage::Connecting).await;

        if let Err(e) = self.probe().await {
            tracing::warn!(error = %e, "Generation endpoint probe failed");
            progress
                .report(GenerationStage::ConnectivityFailed(e.to_string()))
                .await;
            return Err(e);
        }

        progress.report(GenerationStage::Generating).await;

        match self.request(&build_prompt(goal)).await {
            Ok(text) => {
                tracing::info!(chars = text.chars().count(), "Plan generated");
                progress.report(GenerationStage::Succeeded).await;
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Plan generation failed");
                progress
                    .report(GenerationStage::GenerationFailed(e.to_string()))
                    .await;
                Err(e)
            }
        }
    }
}

/// Human-readable detail for a transport error. The URL is stripped because
/// it carries the API key.
fn describe(e: reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("timed out after {timeout:?}")
    } else {
        e.without_url().to_string()
    }
}
