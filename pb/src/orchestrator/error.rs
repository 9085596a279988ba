//! Analysis error types

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::prompts::PromptError;
use crate::store::StoreError;

/// Stage of the advanced pipeline a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Seed,
    Fanout,
    Summary,
}

impl Phase {
    fn label_ru(&self) -> &'static str {
        match self {
            Phase::Seed => "первичного комментария",
            Phase::Fanout => "анализа по темам",
            Phase::Summary => "обобщения",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Seed => "seed",
            Phase::Fanout => "fan-out",
            Phase::Summary => "summary",
        };
        write!(f, "{}", name)
    }
}

/// Errors from analysis and dialog
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Pipeline failed in {phase} phase for topic {topic:?}: {source}")]
    Pipeline {
        phase: Phase,
        topic: String,
        #[source]
        source: LlmError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl AnalysisError {
    /// Short Russian description, shown after "Ошибка: "
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Provider(e) => e.user_message(),
            AnalysisError::Pipeline { phase, topic, source } if topic.is_empty() => {
                format!("сбой на этапе {}: {}", phase.label_ru(), source.user_message())
            }
            AnalysisError::Pipeline { phase, topic, source } => format!(
                "сбой на этапе {} (тема «{}»): {}",
                phase.label_ru(),
                topic,
                source.user_message()
            ),
            AnalysisError::Store(e) => e.user_message(),
            AnalysisError::Config(e) => e.user_message(),
            AnalysisError::Prompt(_) => "не удалось подготовить запрос к модели".to_string(),
        }
    }
}
