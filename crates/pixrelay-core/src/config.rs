//! Configuration module
//!
//! Environment-driven configuration for the chat and messaging collaborators and for the
//! request assembler. Values are read once at startup (after loading `.env`) and passed
//! explicitly to the services that need them.

use std::env;
use std::time::Duration;

use crate::models::{AssemblyOptions, ResizeBound};

// Common constants
const CHAT_API_BASE_URL: &str = "https://api.groq.com/openai/v1";
const CHAT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const CHAT_TEMPERATURE: f32 = 1.0;
const CHAT_TOP_P: f32 = 1.0;
const CHAT_MAX_COMPLETION_TOKENS: u32 = 1024;
const SLACK_API_BASE_URL: &str = "https://slack.com/api";
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Chat completion service settings
#[derive(Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_completion_tokens: u32,
}

/// Messaging (Slack) settings. Absent when no bot token is configured.
#[derive(Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub base_url: String,
}

// Keep credentials out of logs and panic messages.
impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .finish()
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Top-level configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub chat: ChatConfig,
    pub slack: Option<SlackConfig>,
    pub http_timeout_secs: u64,
    pub assembly: AssemblyOptions,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present)
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let api_key = lookup("CHAT_API_KEY")
            .or_else(|| lookup("GROQ_API_KEY"))
            .filter(|k| !k.trim().is_empty());

        let chat = ChatConfig {
            api_key,
            base_url: lookup("CHAT_API_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| CHAT_API_BASE_URL.to_string()),
            model: lookup("CHAT_MODEL").unwrap_or_else(|| CHAT_MODEL.to_string()),
            temperature: parse_or(&lookup, "CHAT_TEMPERATURE", CHAT_TEMPERATURE),
            top_p: parse_or(&lookup, "CHAT_TOP_P", CHAT_TOP_P),
            max_completion_tokens: parse_or(
                &lookup,
                "CHAT_MAX_COMPLETION_TOKENS",
                CHAT_MAX_COMPLETION_TOKENS,
            ),
        };

        let slack = lookup("SLACK_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(|bot_token| SlackConfig {
                bot_token,
                base_url: lookup("SLACK_API_BASE_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| SLACK_API_BASE_URL.to_string()),
            });

        let defaults = AssemblyOptions::default();
        let bound = match lookup("IMAGE_RESIZE_BOUND").as_deref() {
            Some("longest_edge") | Some("longest-edge") => ResizeBound::LongestEdge,
            _ => ResizeBound::Width,
        };
        let assembly = AssemblyOptions {
            max_dimension: parse_or(&lookup, "IMAGE_MAX_DIMENSION", defaults.max_dimension),
            bound,
            jpeg_quality: parse_or(&lookup, "IMAGE_JPEG_QUALITY", defaults.jpeg_quality),
        };

        let config = Config {
            environment,
            chat,
            slack,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
            assembly,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values that would make every request fail
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.assembly.max_dimension == 0 {
            anyhow::bail!("IMAGE_MAX_DIMENSION must be greater than 0");
        }
        if !(1..=100).contains(&self.assembly.jpeg_quality) {
            anyhow::bail!(
                "IMAGE_JPEG_QUALITY must be between 1 and 100 (got {})",
                self.assembly.jpeg_quality
            );
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than 0");
        }
        if self.chat.max_completion_tokens == 0 {
            anyhow::bail!("CHAT_MAX_COMPLETION_TOKENS must be greater than 0");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Chat API key, required for any call to the model service
    pub fn require_chat_api_key(&self) -> Result<&str, anyhow::Error> {
        self.chat
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Missing chat API key. Set CHAT_API_KEY or GROQ_API_KEY"))
    }
}

/// Parse an optional value, falling back to the default when missing or malformed
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
