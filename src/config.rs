//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Settings for the generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL up to and including the API version segment.
    pub base_url: String,
    pub model: String,
    /// Sent as the `key` query parameter.
    pub api_key: SecretString,
    /// Timeout of the connectivity probe.
    pub probe_timeout: Duration,
    /// Timeout of the real generation request.
    pub generate_timeout: Duration,
}

impl GenerationConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key,
            probe_timeout: Duration::from_secs(10),
            generate_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, generate: Duration) -> Self {
        self.probe_timeout = probe;
        self.generate_timeout = generate;
        self
    }

    /// Full `generateContent` URL, without the key.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    /// Telegram bot token. When absent the bot runs on the CLI channel.
    pub telegram_token: Option<SecretString>,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let mut generation = GenerationConfig::new(SecretString::from(api_key));
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            generation.base_url = base_url;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            generation.model = model;
        }
        if let Some(secs) = parse_secs(&lookup, "PLAN_PROBE_TIMEOUT_SECS")? {
            generation.probe_timeout = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "PLAN_GENERATE_TIMEOUT_SECS")? {
            generation.generate_timeout = secs;
        }

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            generation,
            telegram_token,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a whole number of seconds"),
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "timeout must be positive".to_string(),
        });
    }
    Ok(Some(Duration::from_secs(secs)))
}
