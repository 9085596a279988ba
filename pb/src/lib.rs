//! Postbot - audience reaction assistant
//!
//! A chat bot that interviews a user about a planned post (platform, blog
//! type, purpose, audience, text), asks an LLM how the audience will react,
//! and then keeps a follow-up dialog about that analysis.
//!
//! # Modules
//!
//! - [`connector`] - Chat surfaces (Telegram, console)
//! - [`dispatch`] - Per-user ordered event workers
//! - [`controller`] - Commands, buttons and replies
//! - [`interview`] - Interview state machine
//! - [`menu`] - Model selection menu
//! - [`orchestrator`] - Direct/advanced analysis and the dialog gate
//! - [`llm`] - Provider clients behind one trait
//! - [`prompts`] - Prompt templates
//! - [`store`] - Session persistence
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod connector;
pub mod controller;
pub mod dispatch;
pub mod domain;
pub mod interview;
pub mod llm;
pub mod menu;
pub mod orchestrator;
pub mod prompts;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use controller::Controller;
pub use dispatch::{DispatchError, Dispatcher, EventHandler};
pub use domain::{ConversationState, Session};
