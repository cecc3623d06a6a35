//! Per-user session state and the process-wide session store.
//!
//! A session is created lazily on a user's first interaction and lives for the lifetime of the
//! process; there is no expiry and nothing is persisted.
//!
//! The conversational flow of a session is one [`SessionState`] variant, so a user can never be
//! mid-draft and mid-questionnaire at the same time. Authorization is tracked separately because
//! it outlives any single flow.

use crate::questionnaire::{AnswerRecord, QuestionnaireProgress};
use avfito_types::{MessageRef, NonEmptyText, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a session is in its conversational flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    /// `/draft` was requested; the next text message is the draft.
    AwaitingText,
    /// A draft was submitted and waits for approve or cancel.
    PendingApproval {
        draft: NonEmptyText,
        /// The preview message carrying the approve/cancel buttons, once delivered.
        preview: Option<MessageRef>,
    },
    /// A PRO questionnaire is being answered.
    Questionnaire(QuestionnaireProgress),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    authorized_doctor_name: Option<String>,
    state: SessionState,
}

impl Session {
    pub fn doctor_name(&self) -> Option<&str> {
        self.authorized_doctor_name.as_deref()
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized_doctor_name.is_some()
    }

    /// Store the display name resolved from a redeemed code, replacing any earlier one.
    pub fn authorize(&mut self, doctor_name: impl Into<String>) {
        self.authorized_doctor_name = Some(doctor_name.into());
    }

    /// Drop the authorization. The conversational state is left as is.
    #[cfg(test)]
    pub(crate) fn revoke_authorization(&mut self) {
        self.authorized_doctor_name = None;
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn awaiting_draft(&self) -> bool {
        matches!(self.state, SessionState::AwaitingText)
    }

    pub fn draft_text(&self) -> Option<&str> {
        match &self.state {
            SessionState::PendingApproval { draft, .. } => Some(draft.as_str()),
            _ => None,
        }
    }

    pub fn questionnaire_index(&self) -> Option<usize> {
        self.progress().map(QuestionnaireProgress::index)
    }

    pub fn case_text(&self) -> Option<&str> {
        self.progress()
            .and_then(QuestionnaireProgress::case_text)
            .map(NonEmptyText::as_str)
    }

    pub fn answers(&self) -> Option<&AnswerRecord> {
        self.progress().map(QuestionnaireProgress::answers)
    }

    fn progress(&self) -> Option<&QuestionnaireProgress> {
        match &self.state {
            SessionState::Questionnaire(progress) => Some(progress),
            _ => None,
        }
    }
}

/// Process-wide map from user identity to session.
///
/// Every access is a short synchronous critical section; callers must never hold a session
/// across an await point. Cloning the store shares the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<UserId, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Session>> {
        // A panic inside a mutation closure leaves at worst one half-updated session.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of a user's session, if one exists.
    pub fn get(&self, user: UserId) -> Option<Session> {
        self.lock().get(&user).cloned()
    }

    /// Snapshot of a user's session, creating an empty one on first contact.
    pub fn get_or_create(&self, user: UserId) -> Session {
        self.lock().entry(user).or_default().clone()
    }

    /// Run `f` against the user's session, creating it if absent.
    pub fn mutate<R>(&self, user: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.lock();
        f(sessions.entry(user).or_default())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn authorized_count(&self) -> usize {
        self.lock().values().filter(|s| s.is_authorized()).count()
    }
}
