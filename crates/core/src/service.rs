//! Event dispatcher.
//!
//! Commands, text messages and button presses all enter through [`BotService::dispatch`].
//! Each handler mutates the session store in short synchronous steps and only awaits on the
//! transport or the polisher. State committed before an await stays committed if the call fails.
//!
//! Events of one user are serialised through a per-user async mutex, so handlers for the same
//! user never interleave even when events are processed on a parallel runtime.

use crate::access::AccessRegistry;
use crate::config::BotConfig;
use crate::decision::{decide, RuleTable};
use crate::draft::{self, SubmitOutcome};
use crate::error::{BotError, BotResult};
use crate::messages;
use crate::prompt::sanitize_polished;
use crate::questionnaire::{self, AnswerOutcome, PromptView};
use crate::render::render_questionnaire_result;
use crate::session::SessionStore;
use crate::transport::{ButtonToken, InboundEvent, Keyboard, Polisher, Transport};
use avfito_types::{ChatId, MessageRef, UserId, YesNoUnknown};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-user async locks.
#[derive(Debug, Default)]
struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn lock_for(&self, user: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user).or_default().clone()
    }
}

pub struct BotService<T, P> {
    registry: AccessRegistry,
    rules: RuleTable,
    sessions: SessionStore,
    locks: UserLocks,
    transport: T,
    polisher: P,
    owner: Option<UserId>,
    default_doctor_name: String,
}

impl<T: Transport, P: Polisher> BotService<T, P> {
    /// Build the service from startup configuration.
    ///
    /// # Errors
    ///
    /// Fails when the access registry would be empty or the rule table is invalid.
    pub fn new(config: &BotConfig, transport: T, polisher: P) -> BotResult<Self> {
        let registry = config.access_registry()?;
        let rules = config.rule_table()?;
        tracing::info!(
            codes = registry.len(),
            rules = rules.len(),
            "bot service configured"
        );

        Ok(Self {
            registry,
            rules,
            sessions: SessionStore::new(),
            locks: UserLocks::default(),
            transport,
            polisher,
            owner: config.owner(),
            default_doctor_name: config.default_doctor_name().to_owned(),
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one event after waiting for any earlier event of the same user.
    pub async fn dispatch(&self, event: InboundEvent) {
        let lock = self.locks.lock_for(event.user());
        let _guard = lock.lock().await;
        self.handle(event).await;
    }

    /// Handle one event without per-user serialisation.
    ///
    /// Errors never escape: user-facing failures become replies, transport failures are logged.
    pub async fn handle(&self, event: InboundEvent) {
        let user = event.user();
        let kind = event.kind();
        self.sessions.get_or_create(user);

        let result = match event {
            InboundEvent::Command {
                name, args, chat, ..
            } => self.on_command(&name, &args, user, chat).await,
            InboundEvent::Text { content, chat, .. } => self.on_text(&content, user, chat).await,
            InboundEvent::ButtonPress {
                token,
                message,
                callback_id,
                ..
            } => self.on_button(&token, user, message, &callback_id).await,
        };

        if let Err(e) = result {
            tracing::warn!(user = %user, kind, error = %e, "event handling failed");
        }
    }

    async fn on_command(
        &self,
        name: &str,
        args: &str,
        user: UserId,
        chat: ChatId,
    ) -> BotResult<()> {
        tracing::info!(user = %user, command = name, "command");

        match name {
            "start" | "help" => self.say(chat, messages::HELP).await,
            "access" => {
                let code = args.trim();
                if code.is_empty() {
                    return self.say(chat, messages::ACCESS_USAGE).await;
                }
                match self.registry.redeem(&self.sessions, user, code) {
                    Ok(name) => self.say(chat, &messages::access_granted(&name)).await,
                    Err(e) => self.report(chat, user, e).await,
                }
            }
            "draft" => match self.sessions.mutate(user, draft::request_draft) {
                Ok(()) => self.say(chat, messages::SEND_DRAFT_TEXT).await,
                Err(e) => self.report(chat, user, e).await,
            },
            "pro" => match self.sessions.mutate(user, |s| questionnaire::start(s, args)) {
                Ok(first) => {
                    self.say(chat, messages::PRO_INTRO).await?;
                    self.ask(user, chat, first).await
                }
                Err(e) => self.report(chat, user, e).await,
            },
            "cancel" => {
                self.sessions.mutate(user, draft::cancel);
                self.say(chat, messages::DRAFT_CANCELLED).await
            }
            "stats" => {
                if self.owner != Some(user) {
                    return Ok(());
                }
                let text = messages::stats(self.sessions.len(), self.sessions.authorized_count());
                self.say(chat, &text).await
            }
            _ => self.say(chat, messages::UNKNOWN_COMMAND).await,
        }
    }

    async fn on_text(&self, content: &str, user: UserId, chat: ChatId) -> BotResult<()> {
        let accepted = match self.sessions.mutate(user, |s| draft::accept_text(s, content)) {
            Ok(Some(accepted)) => accepted,
            Ok(None) => return Ok(()),
            Err(e) => return self.report(chat, user, e).await,
        };

        tracing::info!(user = %user, chars = accepted.text.char_len(), "polishing draft");
        let polished = match self
            .polisher
            .polish(accepted.text.as_str(), &accepted.doctor_name)
            .await
        {
            Ok(raw) => sanitize_polished(&raw),
            Err(e) => return self.report(chat, user, e).await,
        };
        if polished.is_empty() {
            let err = BotError::GenerationFailure("backend returned empty text".into());
            return self.report(chat, user, err).await;
        }

        match self.sessions.mutate(user, |s| draft::submit_text(s, &polished)) {
            Ok(SubmitOutcome::Stored(text)) => {
                let preview = format!("{}\n\n{}", messages::DRAFT_PREVIEW_HEADER, text);
                let sent = self
                    .transport
                    .send_message(chat, &preview, Some(Keyboard::approval()))
                    .await?;
                self.sessions
                    .mutate(user, |s| draft::set_preview_message(s, sent));
                Ok(())
            }
            Ok(SubmitOutcome::Ignored) => {
                tracing::info!(user = %user, "draft flow changed while polishing; result dropped");
                Ok(())
            }
            Err(e) => self.report(chat, user, e).await,
        }
    }

    async fn on_button(
        &self,
        token: &str,
        user: UserId,
        message: MessageRef,
        callback_id: &str,
    ) -> BotResult<()> {
        match ButtonToken::parse(token) {
            ButtonToken::Approve => {
                let approved = self.sessions.mutate(user, |s| {
                    draft::accepts_button_from(s, message).then(|| draft::approve(s))
                });
                let Some(approved) = approved else {
                    self.ack(callback_id, Some(messages::STALE_BUTTON)).await;
                    return Ok(());
                };
                self.ack(callback_id, None).await;
                match approved {
                    Ok(document) => {
                        tracing::info!(user = %user, "draft approved");
                        self.relabel(message, messages::DRAFT_APPROVED).await;
                        self.say(message.chat, &document).await
                    }
                    Err(e) => self.report(message.chat, user, e).await,
                }
            }
            ButtonToken::Cancel => {
                let cancelled = self.sessions.mutate(user, |s| {
                    draft::accepts_button_from(s, message).then(|| draft::cancel(s))
                });
                if cancelled.is_none() {
                    self.ack(callback_id, Some(messages::STALE_BUTTON)).await;
                    return Ok(());
                }
                self.ack(callback_id, None).await;
                self.relabel(message, messages::DRAFT_CANCELLED).await;
                Ok(())
            }
            ButtonToken::Answer(choice) => self.on_answer(choice, user, message, callback_id).await,
        }
    }

    async fn on_answer(
        &self,
        choice: YesNoUnknown,
        user: UserId,
        message: MessageRef,
        callback_id: &str,
    ) -> BotResult<()> {
        let step = self.sessions.mutate(user, |s| {
            if !questionnaire::accepts_answer_from(s, message) {
                return None;
            }
            let answered = questionnaire::current_prompt(s)?;
            let outcome = questionnaire::answer(s, choice);
            let doctor = s.doctor_name().map(str::to_owned);
            Some((answered, outcome, doctor))
        });

        let Some((answered, outcome, doctor)) = step else {
            self.ack(callback_id, Some(messages::STALE_BUTTON)).await;
            return Ok(());
        };
        self.ack(callback_id, None).await;

        let answered_text = format!("{} — {}", answered.question.prompt, choice.label());
        self.relabel(message, &answered_text).await;

        match outcome {
            AnswerOutcome::Next(next) => self.ask(user, message.chat, next).await,
            AnswerOutcome::Completed(done) => {
                let decision = decide(&done.answers, &self.rules);
                tracing::info!(
                    user = %user,
                    recommendations = decision.recommendations().len(),
                    "questionnaire completed"
                );
                let doctor = doctor.as_deref().unwrap_or(&self.default_doctor_name);
                let document =
                    render_questionnaire_result(doctor, done.case_text.as_ref(), &decision);
                self.transport
                    .send_message(message.chat, &document, None)
                    .await?;
                Ok(())
            }
            AnswerOutcome::Ignored => Ok(()),
        }
    }

    /// Deliver a questionnaire prompt and remember which message carries it.
    async fn ask(&self, user: UserId, chat: ChatId, prompt: PromptView) -> BotResult<()> {
        let text = format!(
            "Вопрос {}/{}\n{}",
            prompt.position, prompt.total, prompt.question.prompt
        );
        let sent = self
            .transport
            .send_message(chat, &text, Some(Keyboard::yes_no_unknown()))
            .await?;
        self.sessions
            .mutate(user, |s| questionnaire::set_prompt_message(s, sent));
        Ok(())
    }

    async fn say(&self, chat: ChatId, text: &str) -> BotResult<()> {
        self.transport.send_message(chat, text, None).await?;
        Ok(())
    }

    async fn report(&self, chat: ChatId, user: UserId, err: BotError) -> BotResult<()> {
        tracing::info!(user = %user, error = %err, "request rejected");
        self.say(chat, err.user_message()).await
    }

    /// Replace the text of an answered or decided message. Failure only costs the cosmetic
    /// update, so it is logged and the handler carries on.
    async fn relabel(&self, message: MessageRef, text: &str) {
        if let Err(e) = self.transport.edit_message(message, text).await {
            tracing::warn!(message_id = message.message_id, error = %e, "failed to edit message");
        }
    }

    async fn ack(&self, callback_id: &str, notice: Option<&str>) {
        if let Err(e) = self.transport.answer_button(callback_id, notice).await {
            tracing::warn!(error = %e, "failed to acknowledge button press");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::QUESTIONS;
    use crate::session::SessionState;
    use async_trait::async_trait;
    use crate::decision::fixtures::sample_rules_file;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::time::Duration;

    const CHAT: ChatId = ChatId(500);
    const DOCTOR: UserId = UserId(1);
    const OWNER: UserId = UserId(99);

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Sent {
        text: String,
        keyboard: Option<Keyboard>,
        message: MessageRef,
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Sent>>,
        edits: Mutex<Vec<(MessageRef, String)>>,
        acks: Mutex<Vec<Option<String>>>,
        next_id: AtomicI64,
        fail_edits: AtomicBool,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.sent().into_iter().map(|s| s.text).collect()
        }

        fn last(&self) -> Sent {
            self.sent().last().cloned().expect("at least one message")
        }

        fn edits(&self) -> Vec<(MessageRef, String)> {
            self.edits.lock().unwrap().clone()
        }

        fn acks(&self) -> Vec<Option<String>> {
            self.acks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_message(
            &self,
            chat: ChatId,
            text: &str,
            keyboard: Option<Keyboard>,
        ) -> BotResult<MessageRef> {
            let message = MessageRef {
                chat,
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            };
            self.sent.lock().unwrap().push(Sent {
                text: text.to_owned(),
                keyboard,
                message,
            });
            Ok(message)
        }

        async fn edit_message(&self, message: MessageRef, text: &str) -> BotResult<()> {
            if self.fail_edits.load(Ordering::SeqCst) {
                return Err(BotError::Transport("message is not modified".into()));
            }
            self.edits.lock().unwrap().push((message, text.to_owned()));
            Ok(())
        }

        async fn answer_button(&self, _callback_id: &str, notice: Option<&str>) -> BotResult<()> {
            self.acks.lock().unwrap().push(notice.map(str::to_owned));
            Ok(())
        }
    }

    struct ScriptedPolisher {
        reply: BotResult<String>,
        delay: Duration,
        echo: bool,
    }

    impl ScriptedPolisher {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_owned()),
                delay: Duration::ZERO,
                echo: false,
            }
        }

        /// Returns the raw text unchanged.
        fn echo() -> Self {
            Self {
                echo: true,
                ..Self::ok("")
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(BotError::GenerationFailure("backend down".into())),
                delay: Duration::ZERO,
                echo: false,
            }
        }

        fn slow(reply: &str, delay: Duration) -> Self {
            Self {
                reply: Ok(reply.to_owned()),
                delay,
                echo: false,
            }
        }
    }

    #[async_trait]
    impl Polisher for ScriptedPolisher {
        async fn polish(&self, raw_text: &str, _doctor_name: &str) -> BotResult<String> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.echo {
                return Ok(raw_text.to_owned());
            }
            self.reply.clone()
        }
    }

    type TestService = BotService<Arc<RecordingTransport>, ScriptedPolisher>;

    fn service_with(polisher: ScriptedPolisher) -> (TestService, Arc<RecordingTransport>) {
        let rules = sample_rules_file();
        let config = BotConfig::new(
            "AV-1:Dr. A;AV-2:Dr. B".into(),
            Some(OWNER),
            None,
            rules.path().to_path_buf(),
        )
        .expect("config");
        let transport = Arc::new(RecordingTransport::default());
        let service = BotService::new(&config, transport.clone(), polisher).expect("service");
        (service, transport)
    }

    fn command(name: &str, args: &str) -> InboundEvent {
        command_from(DOCTOR, name, args)
    }

    fn command_from(user: UserId, name: &str, args: &str) -> InboundEvent {
        InboundEvent::Command {
            name: name.into(),
            args: args.into(),
            user,
            chat: CHAT,
        }
    }

    fn text(content: &str) -> InboundEvent {
        InboundEvent::Text {
            content: content.into(),
            user: DOCTOR,
            chat: CHAT,
        }
    }

    fn press(token: ButtonToken, message: MessageRef) -> InboundEvent {
        InboundEvent::ButtonPress {
            token: token.as_str().into(),
            user: DOCTOR,
            message,
            callback_id: "cb".into(),
        }
    }

    #[tokio::test]
    async fn access_with_known_code_greets_doctor() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", " AV-2 ")).await;

        assert_eq!(transport.last().text, messages::access_granted("Dr. B"));
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.doctor_name(), Some("Dr. B"));
    }

    #[tokio::test]
    async fn access_with_unknown_code_changes_nothing() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", "AV-404")).await;

        assert_eq!(transport.last().text, messages::CODE_NOT_RECOGNISED);
        let session = service.sessions().get(DOCTOR).expect("session");
        assert!(!session.is_authorized());

        service.dispatch(command("access", "")).await;
        assert_eq!(transport.last().text, messages::ACCESS_USAGE);
    }

    #[tokio::test]
    async fn draft_requires_access() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("draft", "")).await;
        assert_eq!(transport.last().text, messages::NO_ACCESS);

        service.dispatch(text("orphan text")).await;
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn full_draft_flow_sends_document_separately() {
        let (service, transport) = service_with(ScriptedPolisher::ok("Take rest"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        assert_eq!(transport.last().text, messages::SEND_DRAFT_TEXT);

        service.dispatch(text("rest pls")).await;
        let preview = transport.last();
        assert!(preview.text.contains("Take rest"));
        assert_eq!(preview.keyboard, Some(Keyboard::approval()));
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.draft_text(), Some("Take rest"));

        service
            .dispatch(press(ButtonToken::Approve, preview.message))
            .await;

        assert_eq!(
            transport.edits(),
            vec![(preview.message, messages::DRAFT_APPROVED.to_owned())]
        );
        let document = transport.last();
        assert!(document.keyboard.is_none());
        assert!(document.text.contains("Dr. A"));
        assert!(document.text.contains("\n\nTake rest\n\n"));
        assert!(document.text.contains("команда AV FITO"));

        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.draft_text(), None);
    }

    #[tokio::test]
    async fn blank_text_keeps_waiting() {
        let (service, transport) = service_with(ScriptedPolisher::ok("unused"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("   ")).await;

        assert_eq!(transport.last().text, messages::EMPTY_TEXT);
        let session = service.sessions().get(DOCTOR).expect("session");
        assert!(session.awaiting_draft());
        assert_eq!(session.draft_text(), None);
    }

    #[tokio::test]
    async fn polish_failure_commits_nothing() {
        let (service, transport) = service_with(ScriptedPolisher::failing());
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("Take rest")).await;

        assert_eq!(transport.last().text, messages::PROCESSING_ERROR);
        let session = service.sessions().get(DOCTOR).expect("session");
        assert!(session.awaiting_draft());
        assert_eq!(session.draft_text(), None);
    }

    #[tokio::test]
    async fn empty_polish_result_is_a_failure() {
        let (service, transport) = service_with(ScriptedPolisher::ok("```\n```"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("Take rest")).await;

        assert_eq!(transport.last().text, messages::PROCESSING_ERROR);
        assert!(service.sessions().get(DOCTOR).expect("session").awaiting_draft());
    }

    #[tokio::test]
    async fn approve_from_idle_reports_draft_not_found() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", "AV-1")).await;
        let stale = MessageRef {
            chat: CHAT,
            message_id: 77,
        };
        service.dispatch(press(ButtonToken::Approve, stale)).await;

        assert_eq!(transport.last().text, messages::DRAFT_NOT_FOUND);
        assert!(transport.edits().is_empty());
    }

    #[tokio::test]
    async fn cancel_button_discards_draft() {
        let (service, transport) = service_with(ScriptedPolisher::ok("Take rest"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("Take rest")).await;
        let preview = transport.last();

        service
            .dispatch(press(ButtonToken::Cancel, preview.message))
            .await;
        assert_eq!(
            transport.edits(),
            vec![(preview.message, messages::DRAFT_CANCELLED.to_owned())]
        );

        service
            .dispatch(press(ButtonToken::Approve, preview.message))
            .await;
        assert_eq!(transport.last().text, messages::DRAFT_NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_during_polish_drops_result() {
        let (service, transport) =
            service_with(ScriptedPolisher::slow("Take rest", Duration::from_millis(50)));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;

        tokio::join!(service.handle(text("Take rest")), service.handle(command("cancel", "")));

        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(transport.sent().iter().all(|s| s.keyboard.is_none()));
    }

    #[tokio::test]
    async fn dispatch_serialises_events_of_one_user() {
        let (service, transport) =
            service_with(ScriptedPolisher::slow("Take rest", Duration::from_millis(50)));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;

        tokio::join!(
            service.dispatch(text("Take rest")),
            service.dispatch(command("cancel", ""))
        );

        let texts = transport.texts();
        let preview = texts
            .iter()
            .position(|t| t.contains("Take rest"))
            .expect("preview sent before cancel ran");
        let cancelled = texts
            .iter()
            .rposition(|t| t == messages::DRAFT_CANCELLED)
            .expect("cancel reply");
        assert!(preview < cancelled);
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn questionnaire_asks_every_question_then_renders() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("pro", "Пациентка, вздутие")).await;

        let mut asked = Vec::new();
        for (i, q) in QUESTIONS.iter().enumerate() {
            let prompt = transport.last();
            assert!(prompt.text.contains(q.prompt), "question {i}");
            assert_eq!(prompt.keyboard, Some(Keyboard::yes_no_unknown()));
            asked.push(prompt.text.clone());

            let choice = if q.key == "stool_strain_or_bloating" {
                YesNoUnknown::Yes
            } else {
                YesNoUnknown::Unknown
            };
            service
                .dispatch(press(ButtonToken::Answer(choice), prompt.message))
                .await;
        }

        assert_eq!(asked.len(), QUESTIONS.len());
        assert_eq!(transport.edits().len(), QUESTIONS.len());

        let document = transport.last();
        assert!(document.keyboard.is_none());
        assert!(document.text.contains("Dr. A"));
        assert!(document.text.contains("Пациентка, вздутие"));
        assert!(document.text.contains("ЖКТ и регулярность стула"));
        assert!(!document.text.contains("Печень"));

        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn stale_answer_buttons_are_ignored() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("pro", "")).await;
        let first = transport.last().message;

        service
            .dispatch(press(ButtonToken::Answer(YesNoUnknown::Yes), first))
            .await;
        service
            .dispatch(press(ButtonToken::Answer(YesNoUnknown::No), first))
            .await;

        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.questionnaire_index(), Some(1));
        let answers = session.answers().expect("in progress");
        assert_eq!(answers.get(QUESTIONS[0].key), YesNoUnknown::Yes);
        assert_eq!(
            transport.acks().last(),
            Some(&Some(messages::STALE_BUTTON.to_owned()))
        );
    }

    #[tokio::test]
    async fn failed_edits_do_not_stall_the_questionnaire() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        transport.fail_edits.store(true, Ordering::SeqCst);
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("pro", "")).await;

        for (i, q) in QUESTIONS.iter().enumerate() {
            let prompt = transport.last();
            assert!(prompt.text.contains(q.prompt), "question {i}");
            service
                .dispatch(press(ButtonToken::Answer(YesNoUnknown::No), prompt.message))
                .await;
        }

        let prompts = transport
            .sent()
            .iter()
            .filter(|s| s.keyboard == Some(Keyboard::yes_no_unknown()))
            .count();
        assert_eq!(prompts, QUESTIONS.len());
        assert!(transport.edits().is_empty());

        let document = transport.last();
        assert!(document.keyboard.is_none());
        assert!(document.text.contains("Dr. A"));
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(transport.acks().iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn answered_prompt_stays_stale_when_its_edit_fails() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        transport.fail_edits.store(true, Ordering::SeqCst);
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("pro", "")).await;
        let first = transport.last().message;

        service
            .dispatch(press(ButtonToken::Answer(YesNoUnknown::Yes), first))
            .await;
        let second = transport.last().message;
        assert_ne!(first, second);

        service
            .dispatch(press(ButtonToken::Answer(YesNoUnknown::No), first))
            .await;

        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.questionnaire_index(), Some(1));
        assert_eq!(
            session.answers().expect("in progress").get(QUESTIONS[0].key),
            YesNoUnknown::Yes
        );
        assert_eq!(transport.last().message, second);
        assert_eq!(
            transport.acks().last(),
            Some(&Some(messages::STALE_BUTTON.to_owned()))
        );
    }

    #[tokio::test]
    async fn approved_document_is_sent_when_preview_edit_fails() {
        let (service, transport) = service_with(ScriptedPolisher::ok("Take rest"));
        transport.fail_edits.store(true, Ordering::SeqCst);
        service.dispatch(command("access", "AV-1")).await;
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("rest pls")).await;
        let preview = transport.last();

        service
            .dispatch(press(ButtonToken::Approve, preview.message))
            .await;

        let document = transport.last();
        assert_ne!(document.message, preview.message);
        assert!(document.keyboard.is_none());
        assert!(document.text.contains("\n\nTake rest\n\n"));
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[tokio::test]
    async fn superseded_preview_cannot_approve() {
        let (service, transport) = service_with(ScriptedPolisher::echo());
        service.dispatch(command("access", "AV-1")).await;

        service.dispatch(command("draft", "")).await;
        service.dispatch(text("Draft A")).await;
        let first = transport.last();
        service.dispatch(command("draft", "")).await;
        service.dispatch(text("Draft B")).await;
        let second = transport.last();
        let sent_before = transport.sent().len();

        service
            .dispatch(press(ButtonToken::Approve, first.message))
            .await;
        assert_eq!(
            transport.acks().last(),
            Some(&Some(messages::STALE_BUTTON.to_owned()))
        );
        assert_eq!(transport.sent().len(), sent_before);
        assert!(transport.edits().is_empty());
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.draft_text(), Some("Draft B"));

        service
            .dispatch(press(ButtonToken::Cancel, first.message))
            .await;
        let session = service.sessions().get(DOCTOR).expect("session");
        assert_eq!(session.draft_text(), Some("Draft B"));

        service
            .dispatch(press(ButtonToken::Approve, second.message))
            .await;
        assert_eq!(
            transport.edits(),
            vec![(second.message, messages::DRAFT_APPROVED.to_owned())]
        );
        let document = transport.last();
        assert!(document.keyboard.is_none());
        assert!(document.text.contains("Draft B"));
        assert!(!document.text.contains("Draft A"));
    }

    #[tokio::test]
    async fn pro_requires_access() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("pro", "case")).await;
        assert_eq!(transport.last().text, messages::NO_ACCESS);
        assert_eq!(
            service.sessions().get(DOCTOR).expect("session").questionnaire_index(),
            None
        );
    }

    #[tokio::test]
    async fn stats_only_answers_owner() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("access", "AV-1")).await;
        let before = transport.sent().len();

        service.dispatch(command("stats", "")).await;
        assert_eq!(transport.sent().len(), before);

        service.dispatch(command_from(OWNER, "stats", "")).await;
        assert_eq!(transport.last().text, messages::stats(2, 1));
    }

    #[tokio::test]
    async fn unknown_command_gets_hint() {
        let (service, transport) = service_with(ScriptedPolisher::ok("x"));
        service.dispatch(command("frobnicate", "")).await;
        assert_eq!(transport.last().text, messages::UNKNOWN_COMMAND);
    }
}
