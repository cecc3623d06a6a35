//! Free-text draft lifecycle.
//!
//! `Idle -> AwaitingText -> PendingApproval -> Idle`. Approve and cancel both return to idle;
//! approve additionally produces the rendered document, which the caller delivers separately
//! from the acknowledgment so it can be copied or forwarded on its own.

use crate::error::{BotError, BotResult};
use crate::render::render_final;
use crate::session::{Session, SessionState};
use avfito_types::{MessageRef, NonEmptyText};

/// Result of offering a text message to the draft lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The session was not waiting for a draft; nothing changed.
    Ignored,
    /// The draft was stored and now waits for approval.
    Stored(NonEmptyText),
}

/// A text message that passed every check and can be committed as a draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedText {
    pub text: NonEmptyText,
    pub doctor_name: String,
}

/// Enter `AwaitingText`. Any in-progress questionnaire is abandoned.
pub fn request_draft(session: &mut Session) -> BotResult<()> {
    if !session.is_authorized() {
        return Err(BotError::Unauthorized);
    }
    session.set_state(SessionState::AwaitingText);
    Ok(())
}

/// Run the checks of [`submit_text`] without committing the draft.
///
/// Returns `Ok(None)` when the session is not waiting for text. A session that lost its
/// authorization leaves `AwaitingText`; blank text keeps it there.
pub fn accept_text(session: &mut Session, text: &str) -> BotResult<Option<AcceptedText>> {
    if !session.awaiting_draft() {
        return Ok(None);
    }

    let Some(doctor_name) = session.doctor_name().map(str::to_owned) else {
        session.set_state(SessionState::Idle);
        return Err(BotError::Unauthorized);
    };

    let text = NonEmptyText::new(text).map_err(|_| BotError::EmptyInput)?;
    Ok(Some(AcceptedText { text, doctor_name }))
}

/// Store `text` as the pending draft.
pub fn submit_text(session: &mut Session, text: &str) -> BotResult<SubmitOutcome> {
    let Some(accepted) = accept_text(session, text)? else {
        return Ok(SubmitOutcome::Ignored);
    };

    session.set_state(SessionState::PendingApproval {
        draft: accepted.text.clone(),
        preview: None,
    });
    Ok(SubmitOutcome::Stored(accepted.text))
}

/// Approve the pending draft and return the rendered document.
///
/// An unauthorized session keeps its draft so it can be approved after a new redemption.
pub fn approve(session: &mut Session) -> BotResult<String> {
    let SessionState::PendingApproval { draft, .. } = session.state() else {
        return Err(BotError::DraftNotFound);
    };
    let Some(doctor_name) = session.doctor_name() else {
        return Err(BotError::Unauthorized);
    };

    let document = render_final(doctor_name, draft.as_str());
    session.set_state(SessionState::Idle);
    Ok(document)
}

/// Remember which delivered message carries the approve/cancel buttons of the pending draft.
pub fn set_preview_message(session: &mut Session, message: MessageRef) {
    if let SessionState::PendingApproval { preview, .. } = session.state_mut() {
        *preview = Some(message);
    }
}

/// Whether an approve or cancel press on `message` may act on the session.
///
/// While a draft is pending only its own preview is live; presses on older previews are stale.
/// Outside `PendingApproval` every press is let through so approve reports
/// [`BotError::DraftNotFound`] and cancel stays a no-op return to idle.
pub fn accepts_button_from(session: &Session, message: MessageRef) -> bool {
    match session.state() {
        SessionState::PendingApproval { preview, .. } => *preview == Some(message),
        _ => true,
    }
}

/// Drop whatever the session was doing and return to idle. Always succeeds.
pub fn cancel(session: &mut Session) {
    session.set_state(SessionState::Idle);
}
