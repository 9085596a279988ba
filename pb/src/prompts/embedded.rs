//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const AUDIENCE_REACTION: &str = include_str!("../../prompts/audience-reaction.pmt");

pub const SEED_COMMENT: &str = include_str!("../../prompts/seed-comment.pmt");

pub const TOPIC: &str = include_str!("../../prompts/topic.pmt");

pub const TOPIC_SUMMARY: &str = include_str!("../../prompts/topic-summary.pmt");

pub const DIALOG_REASONING: &str = include_str!("../../prompts/dialog-reasoning.pmt");

pub const DIALOG_DECISION: &str = include_str!("../../prompts/dialog-decision.pmt");

pub const DIALOG_RESPONSE: &str = include_str!("../../prompts/dialog-response.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "audience-reaction" => Some(AUDIENCE_REACTION),
        "seed-comment" => Some(SEED_COMMENT),
        "topic" => Some(TOPIC),
        "topic-summary" => Some(TOPIC_SUMMARY),
        "dialog-reasoning" => Some(DIALOG_REASONING),
        "dialog-decision" => Some(DIALOG_DECISION),
        "dialog-response" => Some(DIALOG_RESPONSE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_embedded() {
        for name in [
            "audience-reaction",
            "seed-comment",
            "topic",
            "topic-summary",
            "dialog-reasoning",
            "dialog-decision",
            "dialog-response",
        ] {
            assert!(get_embedded(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_decision_asks_for_literal() {
        let decision = get_embedded("dialog-decision").unwrap();
        assert!(decision.contains("true"));
        assert!(decision.contains("false"));
        assert!(decision.contains("{{reasoning}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
