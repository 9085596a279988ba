//! Dialog relevance gate
//!
//! A follow-up message first goes through a reasoning request over the full
//! history, then a short deterministic true/false decision over that
//! reasoning alone. Only an affirmative decision spends a full generation
//! call and touches the history.

use tracing::{debug, info, warn};

use super::{AnalysisError, Orchestrator, request};
use crate::domain::Session;
use crate::llm::Message;

/// Reply to a message judged unrelated to the analysis
pub const OUT_OF_CONTEXT: &str = "Ваше сообщение не связано с контекстом.";

/// Result of one dialog turn
#[derive(Debug)]
pub enum DialogOutcome {
    Answered(String),
    OutOfContext,
    Failed(AnalysisError),
}

impl DialogOutcome {
    /// Text sent back to the user
    pub fn into_text(self) -> String {
        match self {
            DialogOutcome::Answered(text) => text,
            DialogOutcome::OutOfContext => OUT_OF_CONTEXT.to_string(),
            DialogOutcome::Failed(e) => format!("Ошибка: {}", e.user_message()),
        }
    }
}

/// Whether a decision reply means "related"
///
/// Tolerates case, whitespace, surrounding quotes and punctuation.
pub fn is_affirmative(reply: &str) -> bool {
    reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .eq_ignore_ascii_case("true")
}

impl Orchestrator {
    /// Gate a follow-up message and answer it when it is on topic
    pub async fn respond_to_dialog(&self, session: &mut Session, message: &str) -> DialogOutcome {
        debug!(user_id = %session.user_id, message_len = message.len(), "respond_to_dialog: called");
        match self.gated_reply(session, message).await {
            Ok(Some(reply)) => DialogOutcome::Answered(reply),
            Ok(None) => DialogOutcome::OutOfContext,
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "respond_to_dialog: failed");
                DialogOutcome::Failed(e)
            }
        }
    }

    async fn gated_reply(&self, session: &mut Session, message: &str) -> Result<Option<String>, AnalysisError> {
        let client = self.client(session)?;
        let analysis = &self.config.analysis;

        // Stage 1: reasoning over the whole conversation
        let mut messages = session.message_history.clone();
        messages.push(Message::user(self.prompts.dialog_reasoning(message)?));
        let reasoning = client.generate(request(session, messages, analysis.reasoning)).await?;

        // Stage 2: decision over the reasoning only
        let decision_prompt = self.prompts.dialog_decision(&reasoning)?;
        let decision = client
            .generate(request(session, vec![Message::user(decision_prompt)], analysis.decision))
            .await?;
        debug!(decision = %decision.trim(), "gated_reply: decision");

        if !is_affirmative(&decision) {
            info!(user_id = %session.user_id, "Dialog message out of context");
            return Ok(None);
        }

        let asked = Message::user(self.prompts.dialog_response(message)?);
        self.repo.commit(session, move |s| s.message_history.push(asked)).await?;

        let reply = client
            .generate(request(session, session.message_history.clone(), analysis.dialog))
            .await?;
        let answered = Message::assistant(reply.clone());
        self.repo.commit(session, move |s| s.message_history.push(answered)).await?;
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{ConversationState, ModelSelection};
    use crate::llm::client::mock::{MockLlmClient, last_text};
    use crate::llm::{LlmError, ProviderRegistry};
    use crate::prompts::PromptBuilder;
    use crate::store::{MemorySessionStore, SessionRepo, SessionStore};
    use std::sync::Arc;

    async fn setup(client: Arc<MockLlmClient>) -> (Orchestrator, Session, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let repo = SessionRepo::new(store.clone(), ModelSelection::default());
        let orchestrator = Orchestrator::new(
            Arc::new(Config::default()),
            Arc::new(PromptBuilder::embedded_only()),
            ProviderRegistry::new().with("ChatGPT", client),
            repo.clone(),
        );
        let mut session = repo.load_or_create(8).await.unwrap();
        repo.commit(&mut session, |s| {
            s.conversation_state = ConversationState::Dialog;
            s.message_history = vec![Message::user("анализ?"), Message::assistant("вот анализ")];
        })
        .await
        .unwrap();
        (orchestrator, session, store)
    }

    /// Reasoning -> "reasoning", decision -> `decision`, anything else -> "answer"
    fn gate_client(decision: &'static str) -> MockLlmClient {
        MockLlmClient::new(move |r| {
            let text = last_text(r);
            if text.contains("Рассуди") {
                Ok("reasoning".to_string())
            } else if text.contains("true или false") {
                Ok(decision.to_string())
            } else {
                Ok("answer".to_string())
            }
        })
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("true"));
        assert!(is_affirmative("  True.\n"));
        assert!(is_affirmative("\"TRUE\""));
        assert!(!is_affirmative("false"));
        assert!(!is_affirmative("true, but"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("истина"));
    }

    #[tokio::test]
    async fn test_affirmative_answers_and_appends() {
        let client = Arc::new(gate_client("true"));
        let (orchestrator, mut session, store) = setup(client.clone()).await;

        let outcome = orchestrator.respond_to_dialog(&mut session, "а что с критикой?").await;

        assert!(matches!(outcome, DialogOutcome::Answered(ref t) if t == "answer"));
        assert_eq!(client.call_count(), 3);
        assert_eq!(session.message_history.len(), 4);
        assert!(session.message_history[2].content.contains("а что с критикой?"));
        assert_eq!(session.message_history[3], Message::assistant("answer"));
        assert_eq!(store.get(8).await.unwrap().unwrap(), session);

        let requests = client.requests();
        // reasoning sees prior history plus the gate prompt
        assert_eq!(requests[0].messages.len(), 3);
        // decision sees only the reasoning
        assert_eq!(requests[1].messages.len(), 1);
        assert!(requests[1].messages[0].content.contains("reasoning"));
        assert_eq!(requests[1].sampling.temperature, 0.0);
        assert_eq!(requests[1].sampling.max_tokens, 10);
        // continuation runs over the full history
        assert_eq!(requests[2].messages.len(), 3);
        assert_eq!(requests[2].sampling.max_tokens, 700);
    }

    #[tokio::test]
    async fn test_negative_leaves_history_untouched() {
        let client = Arc::new(gate_client("false"));
        let (orchestrator, mut session, store) = setup(client.clone()).await;
        let before = session.clone();
        let writes = store.put_count();

        let outcome = orchestrator.respond_to_dialog(&mut session, "какая погода?").await;

        assert!(matches!(outcome, DialogOutcome::OutOfContext));
        assert_eq!(outcome.into_text(), "Ваше сообщение не связано с контекстом.");
        assert_eq!(session, before);
        assert_eq!(store.put_count(), writes);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let client = Arc::new(MockLlmClient::new(|r| {
            if last_text(r).contains("true или false") {
                Err(LlmError::ApiError {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok("reasoning".to_string())
            }
        }));
        let (orchestrator, mut session, _) = setup(client).await;
        let before = session.clone();

        let outcome = orchestrator.respond_to_dialog(&mut session, "вопрос").await;

        assert!(matches!(outcome, DialogOutcome::Failed(_)));
        assert!(outcome.into_text().starts_with("Ошибка: "));
        assert_eq!(session, before);
    }
}
