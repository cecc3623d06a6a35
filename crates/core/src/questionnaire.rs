//! PRO questionnaire engine.
//!
//! A fixed, ordered battery of yes/no/unknown questions. Progress only moves forward: each
//! answer is recorded at the current position and the index advances by one. There is no
//! back navigation and a position is never asked twice.

use crate::error::{BotError, BotResult};
use crate::session::{Session, SessionState};
use avfito_types::{MessageRef, NonEmptyText, YesNoUnknown};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One question of the battery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Question {
    /// Stable identifier referenced by decision rules.
    pub key: &'static str,
    /// Prompt shown to the doctor.
    pub prompt: &'static str,
}

/// The battery, in the order it is asked.
pub const QUESTIONS: &[Question] = &[
    Question {
        key: "stool_daily",
        prompt: "Стул ежедневный?",
    },
    Question {
        key: "stool_strain_or_bloating",
        prompt: "Есть вздутие или ощущение неполного опорожнения?",
    },
    Question {
        key: "low_energy_or_fatigue",
        prompt: "Есть выраженная слабость, нехватка сил?",
    },
    Question {
        key: "anxiety_or_bad_sleep",
        prompt: "Есть тревожность или нарушения сна?",
    },
    Question {
        key: "overweight_or_belly",
        prompt: "Есть лишний вес или живот?",
    },
    Question {
        key: "sugar_cravings_or_postmeal_sleep",
        prompt: "Тяга к сладкому или сонливость после еды?",
    },
    Question {
        key: "liver_symptoms",
        prompt: "Есть тяжесть справа, горечь, плохая переносимость жирного?",
    },
    Question {
        key: "active_itch",
        prompt: "Есть активный зуд сейчас?",
    },
    Question {
        key: "edema_or_pastosity",
        prompt: "Есть отёки или пастозность?",
    },
    Question {
        key: "lor_chronic",
        prompt: "Есть ЛОР-хроника (гайморит, ринит)?",
    },
    Question {
        key: "joint_pains_no_infl",
        prompt: "Есть суставные боли без явного воспаления?",
    },
];

/// Look up a question by key.
pub fn question_by_key(key: &str) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.key == key)
}

/// Answers keyed by question key.
///
/// Keys are kept sorted so two records with the same mapping compare and iterate identically
/// no matter the order answers were supplied in. A missing key reads as `Unknown`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerRecord(BTreeMap<String, YesNoUnknown>);

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> YesNoUnknown {
        self.0.get(key).copied().unwrap_or(YesNoUnknown::Unknown)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, YesNoUnknown)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn record(&mut self, key: &str, choice: YesNoUnknown) {
        self.0.insert(key.to_owned(), choice);
    }
}

impl<K: Into<String>> FromIterator<(K, YesNoUnknown)> for AnswerRecord {
    fn from_iter<I: IntoIterator<Item = (K, YesNoUnknown)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Progress of an in-progress questionnaire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionnaireProgress {
    pub(crate) index: usize,
    pub(crate) case_text: Option<NonEmptyText>,
    pub(crate) answers: AnswerRecord,
    pub(crate) prompt_message: Option<MessageRef>,
}

impl QuestionnaireProgress {
    fn new(case_text: Option<NonEmptyText>) -> Self {
        Self {
            index: 0,
            case_text,
            answers: AnswerRecord::new(),
            prompt_message: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn case_text(&self) -> Option<&NonEmptyText> {
        self.case_text.as_ref()
    }

    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }
}

/// The prompt to deliver next, with its 1-based position for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromptView {
    pub question: &'static Question,
    pub position: usize,
    pub total: usize,
}

impl PromptView {
    fn at(index: usize) -> Option<Self> {
        QUESTIONS.get(index).map(|question| Self {
            question,
            position: index + 1,
            total: QUESTIONS.len(),
        })
    }
}

/// Result of a finished battery, handed to finalisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedQuestionnaire {
    pub case_text: Option<NonEmptyText>,
    pub answers: AnswerRecord,
}

/// What happened after an answer was offered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// No questionnaire was in progress; nothing changed.
    Ignored,
    /// The answer was recorded and this prompt is next.
    Next(PromptView),
    /// The last answer was recorded; the session is back to idle.
    Completed(CompletedQuestionnaire),
}

/// Begin a questionnaire, discarding any earlier progress or pending draft.
///
/// Returns the first prompt.
pub fn start(session: &mut Session, case_text: &str) -> BotResult<PromptView> {
    if !session.is_authorized() {
        return Err(BotError::Unauthorized);
    }

    let case_text = NonEmptyText::new(case_text).ok();
    session.set_state(SessionState::Questionnaire(QuestionnaireProgress::new(
        case_text,
    )));

    PromptView::at(0).ok_or(BotError::InvalidRules("question battery is empty".into()))
}

/// The prompt at the current position, or `None` when no questionnaire is in progress.
pub fn current_prompt(session: &Session) -> Option<PromptView> {
    match session.state() {
        SessionState::Questionnaire(progress) => PromptView::at(progress.index),
        _ => None,
    }
}

/// Record `choice` at the current position and advance.
pub fn answer(session: &mut Session, choice: YesNoUnknown) -> AnswerOutcome {
    let SessionState::Questionnaire(progress) = session.state_mut() else {
        return AnswerOutcome::Ignored;
    };

    let Some(question) = QUESTIONS.get(progress.index) else {
        return AnswerOutcome::Ignored;
    };

    progress.answers.record(question.key, choice);
    progress.index += 1;
    progress.prompt_message = None;

    match PromptView::at(progress.index) {
        Some(next) => AnswerOutcome::Next(next),
        None => {
            let completed = CompletedQuestionnaire {
                case_text: progress.case_text.take(),
                answers: std::mem::take(&mut progress.answers),
            };
            session.set_state(SessionState::Idle);
            AnswerOutcome::Completed(completed)
        }
    }
}

/// Remember which delivered message carries the current prompt.
pub fn set_prompt_message(session: &mut Session, message: MessageRef) {
    if let SessionState::Questionnaire(progress) = session.state_mut() {
        progress.prompt_message = Some(message);
    }
}

/// Whether a button press on `message` may answer the current prompt.
///
/// Only the message carrying the current prompt is live. Until that prompt has been delivered
/// and recorded with [`set_prompt_message`] no press is accepted, so an answer can never land on
/// a question the doctor has not seen.
pub fn accepts_answer_from(session: &Session, message: MessageRef) -> bool {
    match session.state() {
        SessionState::Questionnaire(progress) => progress.prompt_message == Some(message),
        _ => false,
    }
}
