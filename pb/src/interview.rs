//! Interview state machine
//!
//! Drives the five-step data collection per session. Each step writes one
//! answer and the next state in a single persisted mutation.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::domain::{AnalysisField, ConversationState, Session};
use crate::store::{SessionRepo, StoreError};

/// Errors from interview transitions
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InterviewError {
    pub fn user_message(&self) -> String {
        match self {
            InterviewError::Config(e) => e.user_message(),
            InterviewError::Store(e) => e.user_message(),
        }
    }
}

/// Question of an interview step with its suggested answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPrompt {
    pub state: ConversationState,
    pub text: String,
    pub options: Vec<String>,
}

/// What the caller should do after [`InterviewMachine::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Ask the next question
    Step(StepPrompt),
    /// Ask for the post text
    AwaitPostText(String),
    /// All answers collected, run the analysis
    Analyze,
    /// Forward the message to the relevance gate
    Dialog(String),
    /// State `none` accepts no free input
    Idle,
}

pub struct InterviewMachine {
    config: Arc<Config>,
    repo: SessionRepo,
}

impl InterviewMachine {
    pub fn new(config: Arc<Config>, repo: SessionRepo) -> Self {
        Self { config, repo }
    }

    /// Question and options for an interview step
    pub fn step_prompt(&self, state: ConversationState) -> Result<StepPrompt, ConfigError> {
        let step = self.config.step(state)?;
        Ok(StepPrompt {
            state,
            text: step.text.clone(),
            options: step.options.clone(),
        })
    }

    /// Clear interview data and begin at `platform`; legal from any state
    pub async fn start(&self, session: &mut Session) -> Result<StepPrompt, InterviewError> {
        debug!(user_id = %session.user_id, state = %session.conversation_state, "start: called");
        let prompt = self.step_prompt(ConversationState::Platform)?;
        self.repo
            .commit(session, |s| {
                s.clear();
                s.conversation_state = ConversationState::Platform;
            })
            .await?;
        info!(user_id = %session.user_id, "Interview started");
        Ok(prompt)
    }

    /// Feed one answer into the current state
    pub async fn advance(&self, session: &mut Session, raw_input: &str) -> Result<Advance, InterviewError> {
        let state = session.conversation_state;
        debug!(user_id = %session.user_id, %state, "advance: called");
        let input = raw_input.trim();

        match state {
            ConversationState::None => {
                debug!("advance: state none, ignoring input");
                Ok(Advance::Idle)
            }
            ConversationState::Dialog => {
                debug!("advance: forwarding to dialog");
                Ok(Advance::Dialog(input.to_string()))
            }
            ConversationState::PostText => {
                self.repo
                    .commit(session, |s| {
                        s.analysis_fields.set(AnalysisField::PostText, input);
                        s.conversation_state = ConversationState::Dialog;
                    })
                    .await?;
                info!(user_id = %session.user_id, post_len = input.len(), "Interview complete");
                Ok(Advance::Analyze)
            }
            _ => {
                let step = self.config.step(state)?;
                let (field, next) = (step.field, step.next);
                let reply = if next == ConversationState::PostText {
                    Advance::AwaitPostText(self.config.interview.post_text_prompt.clone())
                } else {
                    Advance::Step(self.step_prompt(next)?)
                };

                self.repo
                    .commit(session, |s| {
                        s.analysis_fields.set(field, input);
                        s.conversation_state = next;
                    })
                    .await?;
                debug!(?field, %next, "advance: stored answer");
                Ok(reply)
            }
        }
    }
}
