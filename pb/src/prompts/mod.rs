//! Prompt templates
//!
//! Renders `.pmt` (Handlebars) templates into the texts sent to providers.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (configured override)
//! 2. Embedded fallback compiled into the binary

pub mod embedded;
mod builder;

pub use builder::{PromptBuilder, PromptError, TopicPrompt};
