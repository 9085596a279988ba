//! Button tokens carried in keyboard callbacks

use std::fmt;

use crate::domain::ConversationState;

/// Parsed callback token
///
/// Wire forms: `family:<F>`, `model:<F>:<M>`, `back:families`,
/// `back:models:<F>`, `analyze`, `option:<state>:<text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceToken {
    Family(String),
    Model { family: String, model: String },
    BackToFamilies,
    BackToModels(String),
    Analyze,
    /// Suggested answer for the interview step `state`
    Option { state: ConversationState, text: String },
}

impl ChoiceToken {
    /// Parse a token; `None` for anything unrecognized
    pub fn parse(token: &str) -> Option<Self> {
        if token == "analyze" {
            return Some(Self::Analyze);
        }
        if token == "back:families" {
            return Some(Self::BackToFamilies);
        }
        if let Some(family) = token.strip_prefix("back:models:") {
            return Some(Self::BackToModels(family.to_string()));
        }
        if let Some(family) = token.strip_prefix("family:") {
            return Some(Self::Family(family.to_string()));
        }
        if let Some(rest) = token.strip_prefix("model:") {
            // model names may contain ':' but family names do not
            let (family, model) = rest.split_once(':')?;
            return Some(Self::Model {
                family: family.to_string(),
                model: model.to_string(),
            });
        }
        let (state, text) = token.strip_prefix("option:")?.split_once(':')?;
        Some(Self::Option {
            state: state.parse().ok()?,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for ChoiceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Family(family) => write!(f, "family:{}", family),
            Self::Model { family, model } => write!(f, "model:{}:{}", family, model),
            Self::BackToFamilies => write!(f, "back:families"),
            Self::BackToModels(family) => write!(f, "back:models:{}", family),
            Self::Analyze => write!(f, "analyze"),
            Self::Option { state, text } => write!(f, "option:{}:{}", state, text),
        }
    }
}
