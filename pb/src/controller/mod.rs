//! Front controller
//!
//! Turns inbound events into interview steps, menu moves and analysis runs,
//! and is the only component that writes to the chat connector.

mod token;

pub use token::ChoiceToken;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError};
use crate::connector::{Button, ChatConnector, ConnectorError, EventKind, InboundEvent, Keyboard, MessageId};
use crate::domain::{ConversationState, Session};
use crate::interview::{Advance, InterviewError, InterviewMachine, StepPrompt};
use crate::llm::{BALANCE_UNAVAILABLE, BalanceSource, ProviderRegistry};
use crate::menu::{FAMILY_PROMPT, MODEL_PROMPT, MenuError, ModelMenu, confirmation_text};
use crate::orchestrator::Orchestrator;
use crate::prompts::PromptBuilder;
use crate::store::{SessionRepo, SessionStore, StoreError};

pub const GREETING: &str = "Привет! Начните анализ вашей текстовой публикации и я подскажу возможную реакцию аудитории.";

pub const CLEARED: &str = "Контекст очищен!";

pub const NO_DATA: &str = "Нет данных для анализа. Используйте /analyze для нового анализа.";

pub const IDLE_HINT: &str = "Используйте /analyze, чтобы начать анализ.";

pub const NO_BALANCE_ACCESS: &str = "Нет доступа к балансу!";

/// Errors that abort handling of one event
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Interview(#[from] InterviewError),

    #[error(transparent)]
    Menu(#[from] MenuError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

impl ControllerError {
    pub fn user_message(&self) -> String {
        match self {
            ControllerError::Config(e) => e.user_message(),
            ControllerError::Store(e) => e.user_message(),
            ControllerError::Interview(e) => e.user_message(),
            ControllerError::Menu(e) => e.user_message(),
            ControllerError::Connector(_) => "не удалось отправить сообщение".to_string(),
        }
    }
}

/// Header and body of an analysis result message
pub fn analysis_report(session: &Session, analysis: &str) -> String {
    let fields = &session.analysis_fields;
    format!(
        "Модель: {}\nПлатформа: {}\nТип блога: {}\nЦель: {}\nАудитория: {}\n\n{}",
        session.model_selection.model_name, fields.platform, fields.blog_type, fields.purpose, fields.audience, analysis
    )
}

pub struct Controller {
    config: Arc<Config>,
    repo: SessionRepo,
    interview: InterviewMachine,
    menu: ModelMenu,
    orchestrator: Orchestrator,
    balance: Arc<dyn BalanceSource>,
    connector: Arc<dyn ChatConnector>,
    /// Last interview step message with a keyboard, per chat
    step_keyboards: Mutex<HashMap<i64, MessageId>>,
}

impl Controller {
    pub fn new(
        config: Arc<Config>,
        registry: ProviderRegistry,
        store: Arc<dyn SessionStore>,
        balance: Arc<dyn BalanceSource>,
        connector: Arc<dyn ChatConnector>,
    ) -> Result<Self, ConfigError> {
        let repo = SessionRepo::new(store, config.default_selection()?);
        let prompts = Arc::new(PromptBuilder::new(config.prompts_dir.clone()));
        Ok(Self {
            interview: InterviewMachine::new(config.clone(), repo.clone()),
            menu: ModelMenu::new(config.clone(), repo.clone()),
            orchestrator: Orchestrator::new(config.clone(), prompts, registry, repo.clone()),
            config,
            repo,
            balance,
            connector,
            step_keyboards: Mutex::new(HashMap::new()),
        })
    }

    /// Handle one event to completion; failures are logged and reported in chat
    pub async fn handle(&self, event: InboundEvent) {
        debug!(user_id = %event.user_id, chat_id = %event.chat_id, kind = ?event.kind, "handle: called");
        let chat_id = event.chat_id;
        if let Err(e) = self.route(event).await {
            error!(%chat_id, error = %e, "handle: event failed");
            let text = format!("Ошибка: {}", e.user_message());
            if let Err(send_err) = self.connector.send(chat_id, &text, None).await {
                error!(%chat_id, error = %send_err, "handle: failed to report error");
            }
        }
    }

    async fn route(&self, event: InboundEvent) -> Result<(), ControllerError> {
        let mut session = self.repo.load_or_create(event.user_id).await?;
        let chat_id = event.chat_id;

        match event.kind {
            EventKind::Command { name, args } => self.command(chat_id, &mut session, &name, &args).await,
            EventKind::Text(text) => self.text(chat_id, &mut session, &text).await,
            EventKind::Choice { token, message_id } => self.choice(chat_id, &mut session, &token, message_id).await,
        }
    }

    async fn command(&self, chat_id: i64, session: &mut Session, name: &str, args: &str) -> Result<(), ControllerError> {
        debug!(%name, "command: called");
        match name {
            "start" => self.send(chat_id, GREETING).await,
            "analyze" => self.start_interview(chat_id, session).await,
            "clear" => {
                self.repo.commit(session, |s| s.clear()).await?;
                info!(user_id = %session.user_id, "Session cleared");
                self.send(chat_id, CLEARED).await
            }
            "reanalyze" => {
                self.repo.commit(session, |s| s.message_history.clear()).await?;
                if session.analysis_fields.post_text.is_empty() {
                    return self.send(chat_id, NO_DATA).await;
                }
                self.analyze_and_report(chat_id, session).await
            }
            "switch" => {
                self.repo.commit(session, |s| s.advanced_mode = !s.advanced_mode).await?;
                let status = if session.advanced_mode { "включен" } else { "выключен" };
                self.send(chat_id, &format!("Расширенный режим анализа {}!", status)).await
            }
            "changemodel" => {
                let keyboard = self.menu.families_keyboard();
                self.connector.send(chat_id, FAMILY_PROMPT, Some(&keyboard)).await?;
                Ok(())
            }
            "currentmodel" => {
                let selection = &session.model_selection;
                let text = format!(
                    "Тип модели: {}\nТекущая модель: {}",
                    selection.provider_family, selection.model_name
                );
                self.send(chat_id, &text).await
            }
            "balance" => self.balance(chat_id, session).await,
            _ => {
                debug!(%name, "command: unknown, treating as text");
                let raw = if args.is_empty() {
                    format!("/{}", name)
                } else {
                    format!("/{} {}", name, args)
                };
                self.text(chat_id, session, &raw).await
            }
        }
    }

    async fn text(&self, chat_id: i64, session: &mut Session, text: &str) -> Result<(), ControllerError> {
        let state = session.conversation_state;
        if state.is_interview_step() || state == ConversationState::PostText {
            self.drop_step_keyboard(chat_id).await;
        }
        self.advance(chat_id, session, text).await
    }

    async fn choice(
        &self,
        chat_id: i64,
        session: &mut Session,
        token: &str,
        message_id: MessageId,
    ) -> Result<(), ControllerError> {
        let Some(choice) = ChoiceToken::parse(token) else {
            warn!(%token, "choice: unrecognized token");
            return Ok(());
        };
        debug!(?choice, "choice: called");

        match choice {
            ChoiceToken::Family(family) => {
                let keyboard = self.menu.models_keyboard(&family)?;
                self.connector.edit(chat_id, message_id, MODEL_PROMPT, Some(&keyboard)).await?;
            }
            ChoiceToken::Model { family, model } => {
                self.menu.select_model(session, &family, &model).await?;
                let keyboard = self.menu.actions_keyboard(&family);
                self.connector
                    .edit(chat_id, message_id, &confirmation_text(&model), Some(&keyboard))
                    .await?;
            }
            ChoiceToken::BackToFamilies => {
                let keyboard = self.menu.families_keyboard();
                self.connector.edit(chat_id, message_id, FAMILY_PROMPT, Some(&keyboard)).await?;
            }
            ChoiceToken::BackToModels(family) => {
                let keyboard = self.menu.models_keyboard(&family)?;
                self.connector.edit(chat_id, message_id, MODEL_PROMPT, Some(&keyboard)).await?;
            }
            ChoiceToken::Analyze => self.start_interview(chat_id, session).await?,
            ChoiceToken::Option { state, text } => {
                if state != session.conversation_state {
                    debug!(button = %state, current = %session.conversation_state, "choice: stale option button");
                    self.connector.edit_keyboard(chat_id, message_id, None).await?;
                    self.forget_step_keyboard(chat_id, message_id);
                    return Ok(());
                }
                self.connector
                    .edit(chat_id, message_id, &format!("Выбрано: {}", text), None)
                    .await?;
                self.forget_step_keyboard(chat_id, message_id);
                self.advance(chat_id, session, &text).await?;
            }
        }
        Ok(())
    }

    async fn advance(&self, chat_id: i64, session: &mut Session, input: &str) -> Result<(), ControllerError> {
        match self.interview.advance(session, input).await? {
            Advance::Idle => self.send(chat_id, IDLE_HINT).await,
            Advance::Step(prompt) => self.send_step(chat_id, &prompt).await,
            Advance::AwaitPostText(text) => self.send(chat_id, &text).await,
            Advance::Analyze => self.analyze_and_report(chat_id, session).await,
            Advance::Dialog(message) => {
                let outcome = self.orchestrator.respond_to_dialog(session, &message).await;
                self.send(chat_id, &outcome.into_text()).await
            }
        }
    }

    async fn start_interview(&self, chat_id: i64, session: &mut Session) -> Result<(), ControllerError> {
        let prompt = self.interview.start(session).await?;
        self.send_step(chat_id, &prompt).await
    }

    async fn analyze_and_report(&self, chat_id: i64, session: &mut Session) -> Result<(), ControllerError> {
        match self.orchestrator.run_analysis(session).await {
            Ok(analysis) => {
                self.send(chat_id, &analysis_report(session, &analysis)).await?;
                if session.conversation_state != ConversationState::Dialog {
                    self.repo
                        .commit(session, |s| s.conversation_state = ConversationState::Dialog)
                        .await?;
                }
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "analyze_and_report: analysis failed");
                self.send(chat_id, &format!("Ошибка: {}", e.user_message())).await
            }
        }
    }

    async fn balance(&self, chat_id: i64, session: &Session) -> Result<(), ControllerError> {
        if self.config.admin_id() != Some(session.user_id) {
            debug!(user_id = %session.user_id, "balance: not admin");
            return self.send(chat_id, NO_BALANCE_ACCESS).await;
        }
        let balance = match self.balance.balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "balance: query failed");
                BALANCE_UNAVAILABLE.to_string()
            }
        };
        self.send(chat_id, &format!("Текущий баланс: {}", balance)).await
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), ControllerError> {
        self.connector.send(chat_id, text, None).await?;
        Ok(())
    }

    async fn send_step(&self, chat_id: i64, prompt: &StepPrompt) -> Result<(), ControllerError> {
        let keyboard = Keyboard::new(
            prompt
                .options
                .iter()
                .map(|o| {
                    let token = ChoiceToken::Option {
                        state: prompt.state,
                        text: o.clone(),
                    };
                    Button::new(o, token.to_string())
                })
                .collect(),
        );
        let keyboard = (!keyboard.is_empty()).then_some(keyboard);
        let message_id = self.connector.send(chat_id, &prompt.text, keyboard.as_ref()).await?;
        if keyboard.is_some()
            && let Ok(mut map) = self.step_keyboards.lock()
        {
            map.insert(chat_id, message_id);
        }
        Ok(())
    }

    fn forget_step_keyboard(&self, chat_id: i64, message_id: MessageId) {
        if let Ok(mut map) = self.step_keyboards.lock()
            && map.get(&chat_id) == Some(&message_id)
        {
            map.remove(&chat_id);
        }
    }

    /// Remove the option buttons of the last step once the user types instead
    async fn drop_step_keyboard(&self, chat_id: i64) {
        let message_id = self.step_keyboards.lock().ok().and_then(|mut map| map.remove(&chat_id));
        if let Some(message_id) = message_id
            && let Err(e) = self.connector.edit_keyboard(chat_id, message_id, None).await
        {
            warn!(%chat_id, error = %e, "drop_step_keyboard: failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;
    use crate::llm::LlmError;
    use crate::llm::client::mock::MockLlmClient;
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Send { text: String, keyboard: Option<Keyboard> },
        Edit { id: MessageId, text: String, keyboard: Option<Keyboard> },
        EditKeyboard { id: MessageId, keyboard: Option<Keyboard> },
    }

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<Sent>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Sent> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }

        fn texts(&self) -> Vec<String> {
            self.take()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Send { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatConnector for Recorder {
        async fn send(&self, _chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ConnectorError> {
            let mut log = self.log.lock().unwrap();
            log.push(Sent::Send {
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            });
            Ok(MessageId(log.len() as i64))
        }

        async fn edit(
            &self,
            _chat_id: i64,
            message_id: MessageId,
            text: &str,
            keyboard: Option<&Keyboard>,
        ) -> Result<(), ConnectorError> {
            self.log.lock().unwrap().push(Sent::Edit {
                id: message_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            });
            Ok(())
        }

        async fn edit_keyboard(
            &self,
            _chat_id: i64,
            message_id: MessageId,
            keyboard: Option<&Keyboard>,
        ) -> Result<(), ConnectorError> {
            self.log.lock().unwrap().push(Sent::EditKeyboard {
                id: message_id,
                keyboard: keyboard.cloned(),
            });
            Ok(())
        }
    }

    struct FixedBalance(Result<&'static str, ()>);

    #[async_trait]
    impl BalanceSource for FixedBalance {
        async fn balance(&self) -> Result<String, LlmError> {
            self.0
                .map(str::to_string)
                .map_err(|_| LlmError::InvalidResponse("no balance".to_string()))
        }
    }

    struct Harness {
        controller: Controller,
        recorder: Arc<Recorder>,
        store: Arc<MemorySessionStore>,
        llm: Arc<MockLlmClient>,
    }

    fn harness_with(config: Config, balance: FixedBalance) -> Harness {
        let recorder = Arc::new(Recorder::default());
        let store = Arc::new(MemorySessionStore::new());
        let llm = Arc::new(MockLlmClient::constant("анализ готов"));
        let registry = ProviderRegistry::new()
            .with("ChatGPT", llm.clone())
            .with("DeepSeek", llm.clone())
            .with("Gemini", llm.clone());
        let controller = Controller::new(
            Arc::new(config),
            registry,
            store.clone(),
            Arc::new(balance),
            recorder.clone(),
        )
        .unwrap();
        Harness {
            controller,
            recorder,
            store,
            llm,
        }
    }

    fn harness() -> Harness {
        harness_with(Config::default(), FixedBalance(Ok("100")))
    }

    fn text(user: i64, t: &str) -> InboundEvent {
        InboundEvent::from_text(user, user, t)
    }

    #[tokio::test]
    async fn test_start_greets_and_creates_session() {
        let h = harness();
        h.controller.handle(text(1, "/start")).await;

        assert_eq!(h.recorder.texts(), vec![GREETING.to_string()]);
        assert!(h.store.get(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_text_in_none_gets_hint() {
        let h = harness();
        h.controller.handle(text(1, "привет")).await;
        h.controller.handle(text(1, "/unknown")).await;

        assert_eq!(h.recorder.texts(), vec![IDLE_HINT.to_string(), IDLE_HINT.to_string()]);
    }

    #[tokio::test]
    async fn test_analyze_sends_platform_keyboard() {
        let h = harness();
        h.controller.handle(text(1, "/analyze")).await;

        let sent = h.recorder.take();
        match &sent[0] {
            Sent::Send {
                text,
                keyboard: Some(keyboard),
            } => {
                assert_eq!(text, "Выберите или напишите платформу для публикации.");
                assert_eq!(keyboard.buttons[0].token, "option:platform:Telegram");
                assert_eq!(keyboard.buttons[1].label, "Twitter (X)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_option_choice_marks_selection_and_advances() {
        let h = harness();
        h.controller.handle(text(1, "/analyze")).await;
        h.recorder.take();

        h.controller
            .handle(InboundEvent::choice(1, 1, "option:platform:Reddit", MessageId(1)))
            .await;

        let sent = h.recorder.take();
        assert_eq!(
            sent[0],
            Sent::Edit {
                id: MessageId(1),
                text: "Выбрано: Reddit".to_string(),
                keyboard: None
            }
        );
        assert!(matches!(&sent[1], Sent::Send { text, .. } if text == "Выберите или напишите тип своего блога."));
        let session = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(session.analysis_fields.platform, "Reddit");
    }

    #[tokio::test]
    async fn test_button_from_earlier_step_is_rejected() {
        let h = harness();
        h.controller.handle(text(1, "/analyze")).await;
        h.controller.handle(text(1, "/analyze")).await;
        h.controller
            .handle(InboundEvent::choice(1, 1, "option:platform:Telegram", MessageId(2)))
            .await;
        h.recorder.take();

        // platform button of the first prompt, pressed while on blog_type
        h.controller
            .handle(InboundEvent::choice(1, 1, "option:platform:Reddit", MessageId(1)))
            .await;

        assert_eq!(
            h.recorder.take(),
            vec![Sent::EditKeyboard {
                id: MessageId(1),
                keyboard: None
            }]
        );
        let session = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(session.analysis_fields.platform, "Telegram");
        assert_eq!(session.analysis_fields.blog_type, "");
        assert_eq!(session.conversation_state, ConversationState::BlogType);
    }

    #[tokio::test]
    async fn test_typed_answer_removes_step_keyboard() {
        let h = harness();
        h.controller.handle(text(1, "/analyze")).await;
        h.recorder.take();

        h.controller.handle(text(1, "Mastodon")).await;

        let sent = h.recorder.take();
        assert_eq!(
            sent[0],
            Sent::EditKeyboard {
                id: MessageId(1),
                keyboard: None
            }
        );
    }

    #[tokio::test]
    async fn test_full_direct_flow_reports_analysis() {
        let h = harness();
        for input in ["/analyze", "Telegram", "СМИ", "Информирование", "Население"] {
            h.controller.handle(text(1, input)).await;
        }
        h.recorder.take();

        h.controller.handle(text(1, "Пост про котов")).await;

        let texts = h.recorder.texts();
        let report = texts.last().unwrap();
        assert!(report.starts_with("Модель: gpt-4.1-nano-2025-04-14\nПлатформа: Telegram\n"));
        assert!(report.ends_with("\n\nанализ готов"));
        assert_eq!(h.llm.call_count(), 1);
        let session = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(session.conversation_state, ConversationState::Dialog);
    }

    #[tokio::test]
    async fn test_switch_toggles() {
        let h = harness();
        h.controller.handle(text(1, "/switch")).await;
        h.controller.handle(text(1, "/switch")).await;

        assert_eq!(
            h.recorder.texts(),
            vec![
                "Расширенный режим анализа включен!".to_string(),
                "Расширенный режим анализа выключен!".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_and_reanalyze_without_data() {
        let h = harness();
        h.controller.handle(text(1, "/clear")).await;
        h.controller.handle(text(1, "/reanalyze")).await;

        assert_eq!(h.recorder.texts(), vec![CLEARED.to_string(), NO_DATA.to_string()]);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_menu_flow() {
        let h = harness();
        h.controller.handle(text(1, "/changemodel")).await;
        h.controller
            .handle(InboundEvent::choice(1, 1, "family:DeepSeek", MessageId(1)))
            .await;
        h.controller
            .handle(InboundEvent::choice(1, 1, "model:DeepSeek:deepseek-reasoner", MessageId(1)))
            .await;
        h.controller.handle(text(1, "/currentmodel")).await;

        let sent = h.recorder.take();
        assert!(matches!(&sent[0], Sent::Send { text, keyboard: Some(_) } if text == FAMILY_PROMPT));
        assert!(matches!(&sent[1], Sent::Edit { text, keyboard: Some(k), .. }
            if text == MODEL_PROMPT && k.buttons.len() == 3));
        assert!(matches!(&sent[2], Sent::Edit { text, .. }
            if text == "Модель изменена на deepseek-reasoner. Выберите действие:"));
        assert!(matches!(&sent[3], Sent::Send { text, .. }
            if text == "Тип модели: DeepSeek\nТекущая модель: deepseek-reasoner"));
    }

    #[tokio::test]
    async fn test_invalid_model_choice_reports_error() {
        let h = harness();
        h.controller
            .handle(InboundEvent::choice(1, 1, "model:ChatGPT:gemini-1.5-pro", MessageId(3)))
            .await;

        let texts = h.recorder.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Ошибка: "));
        let session = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(session.model_selection, ModelSelection::default());
    }

    #[tokio::test]
    async fn test_balance_admin_only() {
        let config = Config {
            admin_id: Some(42),
            ..Default::default()
        };
        let h = harness_with(config, FixedBalance(Ok("512.3")));
        h.controller.handle(text(7, "/balance")).await;
        h.controller.handle(text(42, "/balance")).await;

        assert_eq!(
            h.recorder.texts(),
            vec![NO_BALANCE_ACCESS.to_string(), "Текущий баланс: 512.3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_balance_failure_shows_unavailable() {
        let config = Config {
            admin_id: Some(42),
            ..Default::default()
        };
        let h = harness_with(config, FixedBalance(Err(())));
        h.controller.handle(text(42, "/balance")).await;

        assert_eq!(h.recorder.texts(), vec!["Текущий баланс: Недоступно".to_string()]);
    }

    #[tokio::test]
    async fn test_store_failure_reported_as_error() {
        let h = harness();
        h.controller.handle(text(1, "/start")).await;
        h.recorder.take();
        h.store.set_failing(true);

        h.controller.handle(text(1, "/analyze")).await;

        let texts = h.recorder.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Ошибка: "));
        h.store.set_failing(false);
        let session = h.store.get(1).await.unwrap().unwrap();
        assert_eq!(session.conversation_state, ConversationState::None);
    }

    #[test]
    fn test_analysis_report_layout() {
        let mut session = Session::new(1, ModelSelection::default());
        session.analysis_fields.platform = "Threads".to_string();
        session.analysis_fields.blog_type = "Личный блог".to_string();
        session.analysis_fields.purpose = "Образование".to_string();
        session.analysis_fields.audience = "Молодёжь".to_string();

        assert_eq!(
            analysis_report(&session, "текст"),
            "Модель: gpt-4.1-nano-2025-04-14\nПлатформа: Threads\nТип блога: Личный блог\nЦель: Образование\nАудитория: Молодёжь\n\nтекст"
        );
    }
}
