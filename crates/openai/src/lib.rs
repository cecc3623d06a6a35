//! # AV FITO OpenAI
//!
//! Draft polishing through an OpenAI-compatible chat completions endpoint.
//!
//! The instructions sent with every request come from [`avfito_core::prompt`]; this crate only
//! moves them over HTTP and extracts the reply.

use async_trait::async_trait;
use avfito_core::prompt::{polish_instructions, polish_request};
use avfito_core::{BotError, BotResult, Polisher};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("response contained no text")]
    EmptyResponse,
}

impl From<OpenAiError> for BotError {
    fn from(err: OpenAiError) -> Self {
        BotError::GenerationFailure(err.to_string())
    }
}

pub type OpenAiResult<T> = std::result::Result<T, OpenAiError>;

/// Backend settings. `api_key` is the only required value.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiConfig {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model: non_blank(model).unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: non_blank(base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
        }
    }

    /// Resolve settings through `lookup`. Returns `None` when no API key is set, in which case
    /// the caller should fall back to passing drafts through unchanged.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_blank(lookup(ENV_API_KEY))?;
        Some(Self::new(api_key, lookup(ENV_MODEL), lookup(ENV_BASE_URL)))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(model: &'a str, system: &'a str, user: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        temperature: TEMPERATURE,
    }
}

/// Extract the first choice's text from a chat completions response body.
fn parse_reply(body: &str) -> OpenAiResult<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| OpenAiError::Parse(e.to_string()))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_owned())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(OpenAiError::EmptyResponse);
    }
    Ok(text)
}

/// [`Polisher`] backed by chat completions.
pub struct OpenAiPolisher {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiPolisher {
    pub fn new(config: OpenAiConfig) -> OpenAiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(OpenAiError::Client)?;
        Ok(Self { config, client })
    }

    async fn complete(&self, system: &str, user: &str) -> OpenAiResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = build_request(&self.config.model, system, user);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(OpenAiError::Request)?;

        let status = response.status();
        let text = response.text().await.map_err(OpenAiError::Request)?;
        if !status.is_success() {
            return Err(OpenAiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_reply(&text)
    }
}

#[async_trait]
impl Polisher for OpenAiPolisher {
    async fn polish(&self, raw_text: &str, doctor_name: &str) -> BotResult<String> {
        let system = polish_instructions(doctor_name);
        let user = polish_request(raw_text);

        match self.complete(&system, &user).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(model = %self.config.model, error = %e, "polish request failed");
                Err(e.into())
            }
        }
    }
}
