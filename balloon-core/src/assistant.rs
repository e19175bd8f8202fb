//! Bridge from reconstructed tracks to an OpenAI-compatible chat endpoint.
//!
//! The only thing handed to the assistant is the rendered transcript; the
//! answer comes back as free text and is never interpreted.

use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BalloonError, Result};
use crate::render::Transcript;

pub const ENV_ASSISTANT_API_KEY: &str = "BALLOON_ASSISTANT_API_KEY";
pub const ENV_ASSISTANT_BASE_URL: &str = "BALLOON_ASSISTANT_BASE_URL";
pub const ENV_ASSISTANT_MODEL: &str = "BALLOON_ASSISTANT_MODEL";
pub const ENV_ASSISTANT_TIMEOUT_MS: &str = "BALLOON_ASSISTANT_TIMEOUT_MS";

pub const DEFAULT_ASSISTANT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4";
pub const DEFAULT_ASSISTANT_TIMEOUT_MS: u64 = 60_000;
pub const SYSTEM_PROMPT: &str = "You answer questions about high-altitude balloon flights. \
Each position is (latitude, longitude, altitude, timestamp); a timestamp like \
\"X (from Y)\" means the value at X was carried forward from snapshot Y.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_key = getter(ENV_ASSISTANT_API_KEY)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| BalloonError::InvalidConfig {
                key: ENV_ASSISTANT_API_KEY,
                reason: "required to ask the assistant".to_string(),
            })?;
        let base_url = getter(ENV_ASSISTANT_BASE_URL)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ASSISTANT_BASE_URL.to_string());
        let model = getter(ENV_ASSISTANT_MODEL)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ASSISTANT_MODEL.to_string());
        let timeout_ms = match getter(ENV_ASSISTANT_TIMEOUT_MS) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| BalloonError::InvalidConfig {
                    key: ENV_ASSISTANT_TIMEOUT_MS,
                    reason: format!("not a number of milliseconds: {value}"),
                })?,
            None => DEFAULT_ASSISTANT_TIMEOUT_MS,
        };

        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model,
            timeout_ms,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiChatClient {
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|source| BalloonError::Http {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl CompletionClient for OpenAiChatClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model: request.model.as_str(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system_prompt.as_str(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt.as_str(),
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|source| BalloonError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(BalloonError::Assistant(format!(
                "http status {}: {body}",
                status.as_u16()
            )));
        }

        let response = response
            .json::<ChatCompletionResponse>()
            .map_err(|err| BalloonError::Assistant(format!("decode response failed: {err}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BalloonError::Assistant("empty completion choice".to_string()))
    }
}

/// Builds the user message: the transcript, then the question.
pub fn build_prompt(transcript: &str, question: &str) -> String {
    format!(
        "Balloon position history:\n\n{}\n\nQuestion: {}",
        transcript.trim_end(),
        question.trim()
    )
}

/// Sends `question` with the rendered transcript. An oversized selection is
/// never sent; the caller should show the placeholder instead.
pub fn ask(
    client: &dyn CompletionClient,
    model: &str,
    transcript: &Transcript,
    question: &str,
) -> Result<String> {
    let Transcript::Rendered(text) = transcript else {
        return Err(BalloonError::InvalidSelection(transcript.to_string()));
    };
    if question.trim().is_empty() {
        return Err(BalloonError::Assistant("question is empty".to_string()));
    }

    let request = CompletionRequest {
        model: model.to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: build_prompt(text, question),
    };
    debug!(model, prompt_len = request.user_prompt.len(), "asking assistant");
    client.complete(&request)
}
