//! Seams to the external collaborators.
//!
//! The core never talks to a messaging network or a text-generation service directly. It
//! consumes [`InboundEvent`]s, and it calls out through [`Transport`] and [`Polisher`].

use crate::error::BotResult;
use crate::messages;
use async_trait::async_trait;
use avfito_types::{ChatId, MessageRef, UserId, YesNoUnknown};
use std::sync::Arc;

/// Opaque button payloads the core understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonToken {
    Approve,
    Cancel,
    Answer(YesNoUnknown),
}

impl ButtonToken {
    const APPROVE: &'static str = "draft_approve";
    const CANCEL: &'static str = "draft_cancel";
    const YES: &'static str = "pro_yes";
    const NO: &'static str = "pro_no";
    const UNKNOWN: &'static str = "pro_unk";

    /// Wire value carried by the button.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => Self::APPROVE,
            Self::Cancel => Self::CANCEL,
            Self::Answer(YesNoUnknown::Yes) => Self::YES,
            Self::Answer(YesNoUnknown::No) => Self::NO,
            Self::Answer(YesNoUnknown::Unknown) => Self::UNKNOWN,
        }
    }

    /// Interpret a wire value.
    ///
    /// Anything that is not a draft action is read as a questionnaire answer, and anything that
    /// is not an explicit yes or no is `Unknown`.
    pub fn parse(token: &str) -> Self {
        match token {
            Self::APPROVE => Self::Approve,
            Self::CANCEL => Self::Cancel,
            Self::YES => Self::Answer(YesNoUnknown::Yes),
            Self::NO => Self::Answer(YesNoUnknown::No),
            _ => Self::Answer(YesNoUnknown::Unknown),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: &'static str,
    pub token: ButtonToken,
}

/// A single row of inline buttons attached to an outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyboard(pub Vec<Button>);

impl Keyboard {
    pub fn approval() -> Self {
        Self(vec![
            Button {
                label: messages::BUTTON_APPROVE,
                token: ButtonToken::Approve,
            },
            Button {
                label: messages::BUTTON_CANCEL,
                token: ButtonToken::Cancel,
            },
        ])
    }

    pub fn yes_no_unknown() -> Self {
        Self(vec![
            Button {
                label: messages::BUTTON_YES,
                token: ButtonToken::Answer(YesNoUnknown::Yes),
            },
            Button {
                label: messages::BUTTON_NO,
                token: ButtonToken::Answer(YesNoUnknown::No),
            },
            Button {
                label: messages::BUTTON_UNKNOWN,
                token: ButtonToken::Answer(YesNoUnknown::Unknown),
            },
        ])
    }
}

/// One interaction delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        name: String,
        args: String,
        user: UserId,
        chat: ChatId,
    },
    Text {
        content: String,
        user: UserId,
        chat: ChatId,
    },
    ButtonPress {
        token: String,
        user: UserId,
        message: MessageRef,
        /// Transport handle used to acknowledge the press.
        callback_id: String,
    },
}

impl InboundEvent {
    pub fn user(&self) -> UserId {
        match self {
            Self::Command { user, .. } | Self::Text { user, .. } | Self::ButtonPress { user, .. } => {
                *user
            }
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Text { .. } => "text",
            Self::ButtonPress { .. } => "button",
        }
    }
}

/// Outbound side of the messaging transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to `chat`, optionally with buttons. Returns a handle to the sent message.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> BotResult<MessageRef>;

    /// Replace the text of an already sent message and drop its buttons.
    async fn edit_message(&self, message: MessageRef, text: &str) -> BotResult<()>;

    /// Acknowledge a button press, optionally with a short notice.
    async fn answer_button(&self, callback_id: &str, notice: Option<&str>) -> BotResult<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> BotResult<MessageRef> {
        (**self).send_message(chat, text, keyboard).await
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> BotResult<()> {
        (**self).edit_message(message, text).await
    }

    async fn answer_button(&self, callback_id: &str, notice: Option<&str>) -> BotResult<()> {
        (**self).answer_button(callback_id, notice).await
    }
}

/// Text-generation backend used to polish free-text drafts.
#[async_trait]
pub trait Polisher: Send + Sync {
    /// Return a polished version of `raw_text`.
    ///
    /// Implementations report failure as [`crate::BotError::GenerationFailure`].
    async fn polish(&self, raw_text: &str, doctor_name: &str) -> BotResult<String>;
}

#[async_trait]
impl<P: Polisher + ?Sized> Polisher for Box<P> {
    async fn polish(&self, raw_text: &str, doctor_name: &str) -> BotResult<String> {
        (**self).polish(raw_text, doctor_name).await
    }
}

/// Polisher that keeps the doctor's text as written. Used when no backend is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughPolisher;

#[async_trait]
impl Polisher for PassthroughPolisher {
    async fn polish(&self, raw_text: &str, _doctor_name: &str) -> BotResult<String> {
        Ok(raw_text.trim().to_owned())
    }
}
