//! Lazy creation and mutate-then-persist over a [`SessionStore`]

use std::sync::Arc;
use tracing::{debug, info};

use super::{SessionStore, StoreError};
use crate::domain::{ModelSelection, Session};

/// Session access used by the core
///
/// Every change goes through [`commit`](Self::commit): the caller's session
/// only changes after the store accepted the new version.
#[derive(Clone)]
pub struct SessionRepo {
    store: Arc<dyn SessionStore>,
    default_selection: ModelSelection,
}

impl SessionRepo {
    pub fn new(store: Arc<dyn SessionStore>, default_selection: ModelSelection) -> Self {
        Self {
            store,
            default_selection,
        }
    }

    /// Fetch a session, creating and persisting a default one on first contact
    pub async fn load_or_create(&self, user_id: i64) -> Result<Session, StoreError> {
        debug!(%user_id, "load_or_create: called");
        if let Some(session) = self.store.get(user_id).await? {
            return Ok(session);
        }

        let session = Session::new(user_id, self.default_selection.clone());
        self.store.put(&session).await?;
        info!(%user_id, "Created session");
        Ok(session)
    }

    /// Apply a mutation, persist it, then publish it to `session`
    pub async fn commit<F>(&self, session: &mut Session, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Session),
    {
        debug!(user_id = %session.user_id, "commit: called");
        let mut next = session.clone();
        mutate(&mut next);
        self.store.put(&next).await?;
        *session = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConversationState;
    use crate::store::MemorySessionStore;

    fn repo() -> (Arc<MemorySessionStore>, SessionRepo) {
        let store = Arc::new(MemorySessionStore::new());
        let repo = SessionRepo::new(store.clone(), ModelSelection::default());
        (store, repo)
    }

    #[tokio::test]
    async fn test_first_contact_creates_and_persists() {
        let (store, repo) = repo();

        let session = repo.load_or_create(11).await.unwrap();
        assert_eq!(session.conversation_state, ConversationState::None);
        assert_eq!(store.put_count(), 1);

        let again = repo.load_or_create(11).await.unwrap();
        assert_eq!(again, session);
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_persists_then_updates() {
        let (store, repo) = repo();
        let mut session = repo.load_or_create(1).await.unwrap();

        repo.commit(&mut session, |s| s.conversation_state = ConversationState::Platform)
            .await
            .unwrap();

        assert_eq!(session.conversation_state, ConversationState::Platform);
        assert_eq!(
            store.get(1).await.unwrap().unwrap().conversation_state,
            ConversationState::Platform
        );
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_session_untouched() {
        let (store, repo) = repo();
        let mut session = repo.load_or_create(1).await.unwrap();
        store.set_failing(true);

        let result = repo
            .commit(&mut session, |s| {
                s.advanced_mode = true;
                s.conversation_state = ConversationState::Dialog;
            })
            .await;

        assert!(result.is_err());
        assert!(!session.advanced_mode);
        assert_eq!(session.conversation_state, ConversationState::None);
    }
}
