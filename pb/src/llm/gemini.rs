//! Gemini-style `generateContent` client

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::transport::Transport;
use super::{CompletionRequest, LlmClient, LlmError, Message, Role, strip_emphasis};

/// Gemini API client
pub struct GeminiClient {
    transport: Transport,
}

impl GeminiClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Build the request body for `models/{model}:generateContent`
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %request.model, max_tokens = %request.sampling.max_tokens, "build_request_body: called");
        let sampling = &request.sampling;
        serde_json::json!({
            "contents": self.convert_messages(&request.messages),
            "generationConfig": {
                "temperature": sampling.temperature,
                "frequencyPenalty": sampling.frequency_penalty,
                "presencePenalty": sampling.presence_penalty,
                "maxOutputTokens": sampling.max_tokens,
            }
        })
    }

    /// Gemini calls the assistant side `model`
    fn convert_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{"text": msg.content}],
                })
            })
            .collect()
    }

    fn parse_response(&self, api_response: GeminiResponse) -> Result<String, LlmError> {
        debug!(candidate_count = api_response.candidates.len(), "parse_response: called");
        api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().find_map(|p| p.text))
            .map(|text| strip_emphasis(&text))
            .ok_or_else(|| LlmError::InvalidResponse("response contains no candidate text".to_string()))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(model = %request.model, "generate: called");
        let url = format!(
            "{}/models/{}:generateContent",
            request.endpoint.trim_end_matches('/'),
            request.model
        );
        let body = self.build_request_body(&request);
        let api_response: GeminiResponse = self.transport.post_json(&url, &body).await?;
        self.parse_response(api_response)
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
