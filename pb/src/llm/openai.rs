//! OpenAI-compatible Chat Completions client
//!
//! Serves every provider family that speaks the `/chat/completions` protocol
//! (ChatGPT and DeepSeek through the proxy).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::transport::Transport;
use super::{CompletionRequest, LlmClient, LlmError, strip_emphasis};

/// OpenAI-compatible API client
pub struct OpenAIClient {
    transport: Transport,
}

impl OpenAIClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Build the request body for the Chat Completions API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %request.model, max_tokens = %request.sampling.max_tokens, "build_request_body: called");
        let sampling = &request.sampling;
        serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
            "frequency_penalty": sampling.frequency_penalty,
            "presence_penalty": sampling.presence_penalty,
        })
    }

    /// Pull the text out of the first choice
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<String, LlmError> {
        debug!(choice_count = api_response.choices.len(), "parse_response: called");
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| strip_emphasis(&text))
            .ok_or_else(|| LlmError::InvalidResponse("response contains no message content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(model = %request.model, "generate: called");
        let url = format!("{}/chat/completions", request.endpoint.trim_end_matches('/'));
        let body = self.build_request_body(&request);
        let api_response: OpenAIResponse = self.transport.post_json(&url, &body).await?;
        self.parse_response(api_response)
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;
    use crate::llm::{Message, Sampling};
    use std::time::Duration;

    fn client() -> OpenAIClient {
        OpenAIClient::new(Transport::new("test-key", Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_build_request_body() {
        let request = CompletionRequest::new(
            &ModelSelection::default(),
            vec![Message::user("Hello"), Message::assistant("Hi")],
            Sampling::default().with_max_tokens(150),
        );

        let body = client().build_request_body(&request);

        assert_eq!(body["model"], "gpt-4.1-nano-2025-04-14");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert!(body["frequency_penalty"].is_number());
    }

    #[test]
    fn test_parse_response_strips_emphasis() {
        let api_response: OpenAIResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "**Итог**: ок"}}]
        }))
        .unwrap();

        assert_eq!(client().parse_response(api_response).unwrap(), "Итог: ок");
    }

    #[test]
    fn test_parse_response_without_choices_is_invalid() {
        let api_response: OpenAIResponse = serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            client().parse_response(api_response),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
