//! Store error types

use thiserror::Error;

use crate::config::ConfigError;

/// Errors from session persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Corrupt session document for user {user_id}: {message}")]
    Corrupt { user_id: i64, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Short Russian description for the chat
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Backend(_) => "не удалось сохранить данные сессии".to_string(),
            StoreError::Corrupt { .. } => "данные сессии повреждены".to_string(),
            StoreError::Config(e) => e.user_message(),
        }
    }
}
