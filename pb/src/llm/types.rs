//! LLM request types shared by every provider
//!
//! These types are provider-agnostic: each client shapes them into its own
//! wire format.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ModelSelection;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    /// Maximum tokens in the response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    pub temperature: f32,

    #[serde(rename = "frequency-penalty")]
    pub frequency_penalty: f32,

    #[serde(rename = "presence-penalty")]
    pub presence_penalty: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.5,
            frequency_penalty: 0.3,
            presence_penalty: 0.2,
        }
    }
}

impl Sampling {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Zero out both penalties
    pub fn without_penalties(mut self) -> Self {
        self.frequency_penalty = 0.0;
        self.presence_penalty = 0.0;
        self
    }
}

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Concrete model name, e.g. `gpt-4.1-mini-2025-04-14`
    pub model: String,

    /// Provider endpoint base URL
    pub endpoint: String,

    /// Conversation to complete
    pub messages: Vec<Message>,

    pub sampling: Sampling,
}

impl CompletionRequest {
    /// Build a request against the model a session has selected
    pub fn new(selection: &ModelSelection, messages: Vec<Message>, sampling: Sampling) -> Self {
        debug!(model = %selection.model_name, message_count = messages.len(), "CompletionRequest::new: called");
        Self {
            model: selection.model_name.clone(),
            endpoint: selection.endpoint.clone(),
            messages,
            sampling,
        }
    }

    /// Single user prompt, no history
    pub fn prompt(selection: &ModelSelection, text: impl Into<String>, sampling: Sampling) -> Self {
        Self::new(selection, vec![Message::user(text)], sampling)
    }
}

/// Remove markdown emphasis markers the chat surface cannot render
pub fn strip_emphasis(text: &str) -> String {
    text.replace('*', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_message_serializes_like_chat_api() {
        let json = serde_json::to_value(Message::assistant("ok")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "ok"}));
    }

    #[test]
    fn test_sampling_overrides() {
        let sampling = Sampling::default().with_max_tokens(10).with_temperature(0.0);
        assert_eq!(sampling.max_tokens, 10);
        assert_eq!(sampling.temperature, 0.0);
        assert_eq!(sampling.frequency_penalty, 0.3);

        let quiet = Sampling::default().without_penalties();
        assert_eq!(quiet.frequency_penalty, 0.0);
        assert_eq!(quiet.presence_penalty, 0.0);
    }

    #[test]
    fn test_partial_sampling_uses_defaults() {
        let sampling: Sampling = serde_yaml::from_str("max-tokens: 150\n").unwrap();
        assert_eq!(sampling.max_tokens, 150);
        assert_eq!(sampling.temperature, 0.5);
    }

    #[test]
    fn test_strip_emphasis() {
        assert_eq!(strip_emphasis("**Итог:** *хорошо*"), "Итог: хорошо");
    }
}
