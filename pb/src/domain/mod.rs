//! Core domain types: the per-user session record and its interview state

mod session;
mod state;

pub use session::{AnalysisField, AnalysisFields, ModelSelection, Session};
pub use state::{ConversationState, UnknownStateError};
