//! Interview state machine nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Prefix some stored documents carry in front of the state name
const LEGACY_GROUP_PREFIX: &str = "RuntimeStates:";

/// A persisted state name that maps to no known state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized conversation state: {0:?}")]
pub struct UnknownStateError(pub String);

/// Current node of a session's interview flow
///
/// Linear order: `none -> platform -> blog_type -> purpose -> audience ->
/// post_text -> dialog`. Only `/analyze` leaves `none`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConversationState {
    #[default]
    None,
    Platform,
    BlogType,
    Purpose,
    Audience,
    PostText,
    Dialog,
}

impl ConversationState {
    /// All states in interview order
    pub const ALL: [ConversationState; 7] = [
        Self::None,
        Self::Platform,
        Self::BlogType,
        Self::Purpose,
        Self::Audience,
        Self::PostText,
        Self::Dialog,
    ];

    /// Canonical persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Platform => "platform",
            Self::BlogType => "blog_type",
            Self::Purpose => "purpose",
            Self::Audience => "audience",
            Self::PostText => "post_text",
            Self::Dialog => "dialog",
        }
    }

    /// States that store one interview answer and move on
    pub fn is_interview_step(&self) -> bool {
        matches!(self, Self::Platform | Self::BlogType | Self::Purpose | Self::Audience)
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(state = %s, "ConversationState::from_str: called");
        let name = s.trim();
        let name = name.strip_prefix(LEGACY_GROUP_PREFIX).unwrap_or(name);
        let name = name.strip_prefix("state_").unwrap_or(name);
        match name {
            "none" => Ok(Self::None),
            "platform" => Ok(Self::Platform),
            "blog_type" => Ok(Self::BlogType),
            "purpose" => Ok(Self::Purpose),
            "audience" => Ok(Self::Audience),
            "post_text" => Ok(Self::PostText),
            "dialog" | "discusse" => Ok(Self::Dialog),
            _ => {
                debug!(state = %s, "ConversationState::from_str: no match");
                Err(UnknownStateError(s.to_string()))
            }
        }
    }
}

impl TryFrom<String> for ConversationState {
    type Error = UnknownStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConversationState> for String {
    fn from(state: ConversationState) -> Self {
        state.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_round_trip() {
        for state in ConversationState::ALL {
            assert_eq!(state.as_str().parse::<ConversationState>().unwrap(), state);
        }
    }

    #[test]
    fn test_legacy_names() {
        assert_eq!(
            "state_platform".parse::<ConversationState>().unwrap(),
            ConversationState::Platform
        );
        assert_eq!(
            "state_discusse".parse::<ConversationState>().unwrap(),
            ConversationState::Dialog
        );
        assert_eq!(
            "RuntimeStates:state_post_text".parse::<ConversationState>().unwrap(),
            ConversationState::PostText
        );
    }

    #[test]
    fn test_unknown_state_is_an_error() {
        let err = "state_limbo".parse::<ConversationState>().unwrap_err();
        assert_eq!(err, UnknownStateError("state_limbo".to_string()));
        assert!(serde_json::from_str::<ConversationState>("\"\"").is_err());
    }

    #[test]
    fn test_serializes_canonical_name() {
        let json = serde_json::to_string(&ConversationState::BlogType).unwrap();
        assert_eq!(json, "\"blog_type\"");
    }

    #[test]
    fn test_interview_steps() {
        let steps: Vec<_> = ConversationState::ALL
            .into_iter()
            .filter(|s| s.is_interview_step())
            .collect();
        assert_eq!(steps.len(), 4);
        assert!(!ConversationState::PostText.is_interview_step());
    }
}
