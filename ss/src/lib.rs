//! SessionStore - file-backed JSON document store
//!
//! Persists one JSON document per key, grouped into collections. The postbot
//! service keeps every user session as a document in the `users` collection
//! and rewrites it after each mutation.
//!
//! # Architecture
//!
//! ```text
//! {store_path}/
//! └── {collection}/
//!     ├── .lock            # fs2 advisory lock guarding writes
//!     ├── 1001.json
//!     └── 1002.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::DocumentStore;
//!
//! let store = DocumentStore::open("/var/lib/postbot/sessions")?;
//! store.put("users", "42", &serde_json::json!({"user_id": 42}))?;
//! let doc = store.get("users", "42")?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{DocumentMeta, DocumentStore};

/// Collection holding user session documents
pub const USERS_COLLECTION: &str = "users";
