//! Text generation: the two-phase probe-then-generate client.
//!
//! The controller only sees the `TextGenerator` trait, so tests can swap the
//! HTTP client for a stub. Progress is pushed through a `ProgressSink` that
//! the caller turns into a user-visible status message.

pub mod gemini;

use async_trait::async_trait;

use crate::error::GenerationError;

pub use gemini::GeminiClient;

/// Stages of one `generate` call, in the order they can occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStage {
    Connecting,
    ConnectivityFailed(String),
    Generating,
    GenerationFailed(String),
    Succeeded,
}

impl GenerationStage {
    /// Status line shown to the user for this stage.
    pub fn status_text(&self) -> String {
        match self {
            Self::Connecting => "⏳ Подключаемся к API...".to_string(),
            Self::ConnectivityFailed(detail) => format!("❌ Ошибка подключения: {detail}"),
            Self::Generating => "✅ Подключение установлено\n⏳ Генерируем план...".to_string(),
            Self::GenerationFailed(detail) => format!("❌ Ошибка генерации: {detail}"),
            Self::Succeeded => "✅ План успешно сгенерирован!".to_string(),
        }
    }
}

/// Receiver of generation progress.
#[async_trait]
pub trait ProgressSink: Send {
    async fn report(&mut self, stage: GenerationStage);
}

/// Produces plan text for a goal.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Build the prompt for `goal`, check connectivity, then generate.
    async fn generate(
        &self,
        goal: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<String, GenerationError>;
}
