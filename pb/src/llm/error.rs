//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500 || *status == 408,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
        }
    }

    /// Short Russian description for the chat, without protocol details
    pub fn user_message(&self) -> String {
        match self {
            LlmError::RateLimited { .. } => "превышен лимит запросов к модели, попробуйте позже".to_string(),
            LlmError::ApiError { status, .. } => format!("сервис модели вернул ошибку {}", status),
            LlmError::Network(_) => "не удалось связаться с сервисом модели".to_string(),
            LlmError::InvalidResponse(_) | LlmError::Json(_) => "модель вернула некорректный ответ".to_string(),
            LlmError::Timeout(after) => format!("модель не ответила за {} с", after.as_secs()),
        }
    }
}
