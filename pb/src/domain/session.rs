//! Session record

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ConversationState;
use crate::llm::Message;

/// Which provider family and model answer a user's requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelection {
    #[serde(rename = "model_type")]
    pub provider_family: String,

    pub model_name: String,

    /// Base URL of the family's API
    #[serde(rename = "base_url")]
    pub endpoint: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            provider_family: "ChatGPT".to_string(),
            model_name: "gpt-4.1-nano-2025-04-14".to_string(),
            endpoint: "https://api.proxyapi.ru/openai/v1".to_string(),
        }
    }
}

/// One interview answer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisField {
    Platform,
    BlogType,
    Purpose,
    Audience,
    PostText,
}

/// Answers collected by the interview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisFields {
    pub platform: String,
    pub blog_type: String,
    pub purpose: String,
    pub audience: String,
    pub post_text: String,
}

impl AnalysisFields {
    pub fn get(&self, field: AnalysisField) -> &str {
        match field {
            AnalysisField::Platform => &self.platform,
            AnalysisField::BlogType => &self.blog_type,
            AnalysisField::Purpose => &self.purpose,
            AnalysisField::Audience => &self.audience,
            AnalysisField::PostText => &self.post_text,
        }
    }

    /// Overwrite exactly one field
    pub fn set(&mut self, field: AnalysisField, value: impl Into<String>) {
        let slot = match field {
            AnalysisField::Platform => &mut self.platform,
            AnalysisField::BlogType => &mut self.blog_type,
            AnalysisField::Purpose => &mut self.purpose,
            AnalysisField::Audience => &mut self.audience,
            AnalysisField::PostText => &mut self.post_text,
        };
        *slot = value.into();
    }
}

/// Durable per-user record
///
/// Serialized field names match the documents in the `users` collection, so
/// records written by earlier deployments load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,

    #[serde(flatten)]
    pub model_selection: ModelSelection,

    #[serde(rename = "messages", default)]
    pub message_history: Vec<Message>,

    /// Seed comments from advanced analysis
    #[serde(default)]
    pub comments: Vec<String>,

    #[serde(rename = "analysis_data", default)]
    pub analysis_fields: AnalysisFields,

    #[serde(rename = "state", default)]
    pub conversation_state: ConversationState,

    #[serde(rename = "advanced_analysis", default)]
    pub advanced_mode: bool,
}

impl Session {
    /// Fresh session in state `none`
    pub fn new(user_id: i64, model_selection: ModelSelection) -> Self {
        debug!(%user_id, model = %model_selection.model_name, "Session::new: called");
        Self {
            user_id,
            model_selection,
            message_history: Vec::new(),
            comments: Vec::new(),
            analysis_fields: AnalysisFields::default(),
            conversation_state: ConversationState::None,
            advanced_mode: false,
        }
    }

    /// Reset interview data; identity, model selection and mode survive
    pub fn clear(&mut self) {
        debug!(user_id = %self.user_id, "Session::clear: called");
        self.message_history.clear();
        self.comments.clear();
        self.analysis_fields = AnalysisFields::default();
        self.conversation_state = ConversationState::None;
    }
}
