//! Analysis orchestrator
//!
//! Owns the two analysis strategies and the dialog relevance gate. All
//! provider calls go through the client registered for the session's
//! provider family; history changes go through [`SessionRepo::commit`].

mod analysis;
mod error;
mod gate;

pub use error::{AnalysisError, Phase};
pub use gate::{DialogOutcome, OUT_OF_CONTEXT, is_affirmative};

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::domain::Session;
use crate::llm::{CompletionRequest, LlmClient, Message, ProviderRegistry, Sampling};
use crate::prompts::PromptBuilder;
use crate::store::SessionRepo;

pub struct Orchestrator {
    config: Arc<Config>,
    prompts: Arc<PromptBuilder>,
    registry: ProviderRegistry,
    repo: SessionRepo,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, prompts: Arc<PromptBuilder>, registry: ProviderRegistry, repo: SessionRepo) -> Self {
        Self {
            config,
            prompts,
            registry,
            repo,
        }
    }

    /// Run whichever strategy the session's mode selects
    pub async fn run_analysis(&self, session: &mut Session) -> Result<String, AnalysisError> {
        debug!(user_id = %session.user_id, advanced = session.advanced_mode, "run_analysis: called");
        if session.advanced_mode {
            self.advanced_analyze(session).await
        } else {
            self.analyze(session).await
        }
    }

    fn client(&self, session: &Session) -> Result<Arc<dyn LlmClient>, AnalysisError> {
        Ok(self.registry.client_for(&session.model_selection)?)
    }
}

/// One request against the session's model
fn request(session: &Session, messages: Vec<Message>, sampling: Sampling) -> CompletionRequest {
    CompletionRequest::new(&session.model_selection, messages, sampling)
}
