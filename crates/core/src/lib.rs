//! # AV FITO Core
//!
//! Conversation logic for the AV FITO doctor assistant bot.
//!
//! This crate owns everything that does not depend on a concrete messaging network or
//! text-generation backend:
//! - Access codes and per-user sessions
//! - The free-text draft lifecycle (request, polish, approve, cancel)
//! - The PRO questionnaire and the rule table that turns answers into recommendations
//! - Rendering of the final documents sent to the doctor
//!
//! **No network concerns**: the Telegram transport and the OpenAI polisher live in
//! `avfito-telegram` and `avfito-openai` and plug in through [`Transport`] and [`Polisher`].

pub mod access;
pub mod config;
pub mod constants;
pub mod decision;
pub mod draft;
pub mod error;
pub mod messages;
pub mod prompt;
pub mod questionnaire;
pub mod render;
pub mod service;
pub mod session;
pub mod transport;

pub use access::AccessRegistry;
pub use config::BotConfig;
pub use decision::{decide, Decision, RuleTable};
pub use error::{BotError, BotResult};
pub use questionnaire::{AnswerRecord, QUESTIONS};
pub use service::BotService;
pub use session::{Session, SessionState, SessionStore};
pub use transport::{
    Button, ButtonToken, InboundEvent, Keyboard, PassthroughPolisher, Polisher, Transport,
};
