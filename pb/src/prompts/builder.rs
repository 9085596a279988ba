//! Prompt builder

use std::path::PathBuf;

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::embedded;
use crate::config::TopicConfig;
use crate::domain::AnalysisFields;

/// Prompt loading and rendering failures
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

/// One fan-out prompt with the topic it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPrompt {
    pub topic: String,
    pub beginning: String,
    pub prompt: String,
}

#[derive(Serialize)]
struct TopicContext<'a> {
    #[serde(flatten)]
    fields: &'a AnalysisFields,
    topic: &'a str,
    beginning: &'a str,
}

#[derive(Serialize)]
struct SummaryContext<'a> {
    topic: &'a str,
    beginning: &'a str,
    reply: &'a str,
}

/// Maps analysis data and dialog context to prompt texts; no side effects
pub struct PromptBuilder {
    hbs: Handlebars<'static>,
    override_dir: Option<PathBuf>,
}

impl PromptBuilder {
    /// Builder that prefers `.pmt` files in `override_dir` when present
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        debug!(?override_dir, "PromptBuilder::new: called");
        let mut hbs = Handlebars::new();
        // Output goes to a chat model, not a browser
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            override_dir: override_dir.filter(|d| d.is_dir()),
        }
    }

    /// Builder that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "PromptBuilder::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptBuilder::load_template: found override");
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, PromptError> {
        let template = self.load_template(name)?;
        self.hbs
            .render_template(&template, context)
            .map(|text| text.trim_end().to_string())
            .map_err(|e| PromptError::Render {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Single prompt of direct analysis
    pub fn audience_reaction(&self, fields: &AnalysisFields) -> Result<String, PromptError> {
        debug!(platform = %fields.platform, "audience_reaction: called");
        self.render("audience-reaction", fields)
    }

    /// Short opening reaction of advanced analysis
    pub fn seed_comment(&self, fields: &AnalysisFields) -> Result<String, PromptError> {
        debug!(platform = %fields.platform, "seed_comment: called");
        self.render("seed-comment", fields)
    }

    /// One fan-out prompt per topic, in topic order
    pub fn topics(&self, fields: &AnalysisFields, topics: &[TopicConfig]) -> Result<Vec<TopicPrompt>, PromptError> {
        debug!(topic_count = topics.len(), "topics: called");
        topics
            .iter()
            .map(|t| {
                let context = TopicContext {
                    fields,
                    topic: &t.label,
                    beginning: &t.beginning,
                };
                Ok(TopicPrompt {
                    topic: t.label.clone(),
                    beginning: t.beginning.clone(),
                    prompt: self.render("topic", &context)?,
                })
            })
            .collect()
    }

    /// Summary request for one fan-out reply
    pub fn topic_summary(&self, topic: &TopicPrompt, reply: &str) -> Result<String, PromptError> {
        debug!(topic = %topic.topic, reply_len = reply.len(), "topic_summary: called");
        let context = SummaryContext {
            topic: &topic.topic,
            beginning: &topic.beginning,
            reply,
        };
        self.render("topic-summary", &context)
    }

    /// Relevance gate, stage one
    pub fn dialog_reasoning(&self, message: &str) -> Result<String, PromptError> {
        self.render("dialog-reasoning", &serde_json::json!({ "message": message }))
    }

    /// Relevance gate, stage two
    pub fn dialog_decision(&self, reasoning: &str) -> Result<String, PromptError> {
        self.render("dialog-decision", &serde_json::json!({ "reasoning": reasoning }))
    }

    /// Dialog continuation after an affirmative decision
    pub fn dialog_response(&self, message: &str) -> Result<String, PromptError> {
        self.render("dialog-response", &serde_json::json!({ "message": message }))
    }
}
