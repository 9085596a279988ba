//! Session store backed by the file document store

use async_trait::async_trait;
use sessionstore::DocumentStore;
use std::sync::Arc;
use tracing::{debug, info};

use super::{SessionStore, StoreError};
use crate::config::ConfigError;
use crate::domain::{ConversationState, Session};

/// Adapter from [`DocumentStore`] to [`SessionStore`]
///
/// Document I/O is blocking and runs on the blocking pool.
#[derive(Clone)]
pub struct DocumentSessionStore {
    store: Arc<DocumentStore>,
    collection: String,
}

impl DocumentSessionStore {
    pub fn open(path: impl AsRef<std::path::Path>, collection: impl Into<String>) -> eyre::Result<Self> {
        let store = DocumentStore::open(path)?;
        info!(path = %store.base_path().display(), "Opened session store");
        Ok(Self {
            store: Arc::new(store),
            collection: collection.into(),
        })
    }
}

/// Decode a stored document, reporting an unknown state as a configuration error
fn decode(user_id: i64, doc: serde_json::Value) -> Result<Session, StoreError> {
    if let Some(state) = doc.get("state").and_then(|s| s.as_str()) {
        state.parse::<ConversationState>().map_err(ConfigError::from)?;
    }
    serde_json::from_value(doc).map_err(|e| StoreError::Corrupt {
        user_id,
        message: e.to_string(),
    })
}

#[async_trait]
impl SessionStore for DocumentSessionStore {
    async fn get(&self, user_id: i64) -> Result<Option<Session>, StoreError> {
        debug!(%user_id, "DocumentSessionStore::get: called");
        let store = self.store.clone();
        let collection = self.collection.clone();
        let doc = tokio::task::spawn_blocking(move || store.get(&collection, &user_id.to_string()))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map_err(|e| StoreError::Backend(format!("{:#}", e)))?;

        match doc {
            Some(doc) => decode(user_id, doc).map(Some),
            None => {
                debug!(%user_id, "DocumentSessionStore::get: no document");
                Ok(None)
            }
        }
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        debug!(user_id = %session.user_id, "DocumentSessionStore::put: called");
        let doc = serde_json::to_value(session).map_err(|e| StoreError::Backend(e.to_string()))?;
        let store = self.store.clone();
        let collection = self.collection.clone();
        let id = session.user_id.to_string();
        tokio::task::spawn_blocking(move || store.put(&collection, &id, &doc))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map_err(|e| StoreError::Backend(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;
    use crate::llm::Message;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_files() {
        let temp = TempDir::new().unwrap();
        let store = DocumentSessionStore::open(temp.path(), "users").unwrap();

        let mut session = Session::new(-100_500, ModelSelection::default());
        session.message_history.push(Message::user("привет"));
        session.conversation_state = ConversationState::Purpose;
        store.put(&session).await.unwrap();

        assert_eq!(store.get(-100_500).await.unwrap(), Some(session));
        assert!(store.get(1).await.unwrap().is_none());
        assert!(temp.path().join("users").join("-100500.json").exists());
    }

    #[tokio::test]
    async fn test_unknown_state_is_config_error() {
        let temp = TempDir::new().unwrap();
        let raw = DocumentStore::open(temp.path()).unwrap();
        raw.put("users", "3", &serde_json::json!({"user_id": 3, "state": "state_lost"}))
            .unwrap();

        let store = DocumentSessionStore::open(temp.path(), "users").unwrap();
        assert!(matches!(
            store.get(3).await,
            Err(StoreError::Config(ConfigError::UnknownState(_)))
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let raw = DocumentStore::open(temp.path()).unwrap();
        raw.put("users", "4", &serde_json::json!({"state": "none"})).unwrap();

        let store = DocumentSessionStore::open(temp.path(), "users").unwrap();
        assert!(matches!(store.get(4).await, Err(StoreError::Corrupt { user_id: 4, .. })));
    }
}
