//! Conversion of Bot API updates into core events.

use crate::api::Update;
use avfito_core::InboundEvent;
use avfito_types::{ChatId, MessageRef, UserId};

/// Split `/name@bot args` into a lowercase command name and its trimmed arguments.
///
/// Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_owned()))
}

/// Map one update to an event. Updates the bot does not react to yield `None`.
pub fn update_to_event(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        return Some(InboundEvent::ButtonPress {
            token: query.data.unwrap_or_default(),
            user: UserId(query.from.id),
            message: MessageRef {
                chat: ChatId(message.chat.id),
                message_id: message.message_id,
            },
            callback_id: query.id,
        });
    }

    let message = update.message?;
    let user = UserId(message.from?.id);
    let chat = ChatId(message.chat.id);
    let text = message.text?;

    Some(match parse_command(&text) {
        Some((name, args)) => InboundEvent::Command {
            name,
            args,
            user,
            chat,
        },
        None => InboundEvent::Text {
            content: text,
            user,
            chat,
        },
    })
}
