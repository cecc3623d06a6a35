use crate::messages;

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum BotError {
    #[error("no redeemed access code for this user")]
    Unauthorized,
    #[error("access code not recognised")]
    InvalidCode,
    #[error("submitted text is empty")]
    EmptyInput,
    #[error("no pending draft to approve")]
    DraftNotFound,
    #[error("text generation failed: {0}")]
    GenerationFailure(String),
    #[error("malformed configuration record: {0}")]
    MalformedConfig(String),
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid rule table: {0}")]
    InvalidRules(String),
    #[error("transport call failed: {0}")]
    Transport(String),
}

impl BotError {
    /// Short text shown to the user when this error ends a handler.
    pub fn user_message(&self) -> &'static str {
        match self {
            BotError::Unauthorized => messages::NO_ACCESS,
            BotError::InvalidCode => messages::CODE_NOT_RECOGNISED,
            BotError::EmptyInput => messages::EMPTY_TEXT,
            BotError::DraftNotFound => messages::DRAFT_NOT_FOUND,
            BotError::GenerationFailure(_) => messages::PROCESSING_ERROR,
            BotError::MalformedConfig(_)
            | BotError::MissingConfig(_)
            | BotError::InvalidRules(_)
            | BotError::Transport(_) => messages::PROCESSING_ERROR,
        }
    }
}

pub type BotResult<T> = std::result::Result<T, BotError>;
