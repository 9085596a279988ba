//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, LlmError};

/// Stateless LLM client - each call is independent
///
/// Conversation history lives in the session; callers pass whatever slice of
/// it a request needs. One implementation exists per wire protocol, and the
/// payload shaping is entirely internal to it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion and return its text
    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
