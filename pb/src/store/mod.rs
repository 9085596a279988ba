//! Session persistence
//!
//! [`SessionStore`] is the keyed get/put seam; [`SessionRepo`] layers the
//! lazy-create and mutate-then-persist rules on top of it.

mod document;
mod error;
mod memory;
mod repo;

pub use document::DocumentSessionStore;
pub use error::StoreError;
pub use memory::MemorySessionStore;
pub use repo::SessionRepo;

use async_trait::async_trait;

use crate::domain::Session;

/// Keyed storage of session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session, `None` for an unknown user
    async fn get(&self, user_id: i64) -> Result<Option<Session>, StoreError>;

    /// Create or replace a session
    async fn put(&self, session: &Session) -> Result<(), StoreError>;
}
