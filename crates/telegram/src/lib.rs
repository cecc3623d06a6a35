//! # AV FITO Telegram
//!
//! Telegram Bot API transport for the AV FITO bot.
//!
//! - [`TelegramClient`] long-polls `getUpdates` and turns updates into core events
//! - It implements [`Transport`] for sending, editing and acknowledging
//!
//! The bot token is part of every request URL, so it is stripped from errors before they are
//! logged or returned.

pub mod api;
pub mod event;
pub mod text;

use api::{
    AnswerCallbackQuery, ApiResponse, EditMessageText, GetUpdates, InlineKeyboardMarkup, Message,
    SendMessage, Update,
};
use async_trait::async_trait;
use avfito_core::{BotError, BotResult, InboundEvent, Keyboard, Transport};
use avfito_types::{ChatId, MessageRef};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use event::{parse_command, update_to_event};
pub use text::{split_message, utf16_len, MAX_MESSAGE_LEN};

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_API_URL: &str = "TELEGRAM_API_URL";
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Long-poll wait passed to `getUpdates`, in seconds.
pub const POLL_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("request to {method} failed: {source}")]
    Request {
        method: &'static str,
        source: reqwest::Error,
    },
    #[error("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("failed to parse {method} response: {reason}")]
    Parse {
        method: &'static str,
        reason: String,
    },
}

impl From<TelegramError> for BotError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::MissingConfig(var) => BotError::MissingConfig(var.into()),
            other => BotError::Transport(other.to_string()),
        }
    }
}

pub type TelegramResult<T> = std::result::Result<T, TelegramError>;

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    token: String,
    api_url: String,
}

impl TelegramConfig {
    /// Resolve the transport settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::MissingConfig`] when the bot token is absent or blank.
    pub fn from_lookup<F>(lookup: F) -> TelegramResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(ENV_BOT_TOKEN)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(TelegramError::MissingConfig(ENV_BOT_TOKEN))?;
        let api_url = lookup(ENV_API_URL)
            .map(|u| u.trim().trim_end_matches('/').to_owned())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());

        Ok(Self { token, api_url })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

pub struct TelegramClient {
    base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> TelegramResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TelegramError::Client)?;

        Ok(Self {
            base: format!("{}/bot{}", config.api_url, config.token),
            client,
        })
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Duration,
    ) -> TelegramResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base, method);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Request {
                method,
                source: e.without_url(),
            })?;

        let envelope: ApiResponse<T> =
            response.json().await.map_err(|e| TelegramError::Parse {
                method,
                reason: e.without_url().to_string(),
            })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::Api {
                method,
                description: description.unwrap_or_else(|| "no description".into()),
            }),
        }
    }

    /// Fetch pending updates after `offset`, waiting up to `timeout_secs` for new ones.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> TelegramResult<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call(
            "getUpdates",
            &body,
            REQUEST_TIMEOUT + Duration::from_secs(timeout_secs),
        )
        .await
    }

    /// Fetch the next batch of events and advance `offset` past every update received,
    /// including those that map to no event.
    pub async fn next_events(
        &self,
        offset: &mut Option<i64>,
    ) -> TelegramResult<Vec<InboundEvent>> {
        let updates = self.get_updates(*offset, POLL_TIMEOUT_SECS).await?;
        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            *offset = Some(last + 1);
        }

        let events: Vec<InboundEvent> = updates.into_iter().filter_map(update_to_event).collect();
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "received events");
        }
        Ok(events)
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> BotResult<MessageRef> {
        // The Bot API rejects blank messages; blank chunks only carry separating empty lines.
        let chunks: Vec<String> = split_message(text, MAX_MESSAGE_LEN)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        let last = chunks.len().saturating_sub(1);
        let mut sent = None;

        for (i, chunk) in chunks.iter().enumerate() {
            let reply_markup = if i == last {
                keyboard.as_ref().map(InlineKeyboardMarkup::from)
            } else {
                None
            };
            let body = SendMessage {
                chat_id: chat.0,
                text: chunk,
                reply_markup,
            };
            let message: Message = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
            sent = Some(MessageRef {
                chat,
                message_id: message.message_id,
            });
        }

        sent.ok_or_else(|| BotError::Transport("nothing was sent".into()))
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> BotResult<()> {
        let mut chunks = split_message(text, MAX_MESSAGE_LEN).into_iter();
        let first = chunks.next().unwrap_or_default();

        let body = EditMessageText {
            chat_id: message.chat.0,
            message_id: message.message_id,
            text: &first,
        };
        let _: serde_json::Value = self.call("editMessageText", &body, REQUEST_TIMEOUT).await?;

        for rest in chunks {
            self.send_message(message.chat, &rest, None).await?;
        }
        Ok(())
    }

    async fn answer_button(&self, callback_id: &str, notice: Option<&str>) -> BotResult<()> {
        let body = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text: notice,
        };
        let _: bool = self
            .call("answerCallbackQuery", &body, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}
