//! In-memory session store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use super::{SessionStore, StoreError};
use crate::domain::Session;

/// Volatile store for the console mode and tests
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
    failing: AtomicBool,
    puts: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: i64) -> Result<Option<Session>, StoreError> {
        debug!(%user_id, "MemorySessionStore::get: called");
        Ok(self.sessions.lock().await.get(&user_id).cloned())
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        debug!(user_id = %session.user_id, "MemorySessionStore::put: called");
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store is failing".to_string()));
        }
        self.sessions.lock().await.insert(session.user_id, session.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemorySessionStore::new();
        assert!(store.get(1).await.unwrap().is_none());

        store.put(&Session::new(1, ModelSelection::default())).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap().user_id, 1);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_put() {
        let store = MemorySessionStore::new();
        store.set_failing(true);
        assert!(store.put(&Session::new(1, ModelSelection::default())).await.is_err());
        assert!(store.get(1).await.unwrap().is_none());
    }
}
