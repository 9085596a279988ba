//! Chat surface types shared by every connector

use thiserror::Error;
use tracing::debug;

/// Identifier of a sent message, used to edit it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Inline button: label shown to the user, token sent back on press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Inline keyboard, one button per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub buttons: Vec<Button>,
}

impl Keyboard {
    pub fn new(buttons: Vec<Button>) -> Self {
        Self { buttons }
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

/// What a user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`
    Command { name: String, args: String },
    Text(String),
    /// Button press on the message `message_id`
    Choice { token: String, message_id: MessageId },
}

/// One inbound event from a chat surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: i64,
    pub chat_id: i64,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Classify typed text as a command or plain text
    ///
    /// `/name@botname args` is a command named `name`.
    pub fn from_text(user_id: i64, chat_id: i64, text: &str) -> Self {
        debug!(%user_id, %chat_id, "InboundEvent::from_text: called");
        let trimmed = text.trim();
        let kind = match trimmed.strip_prefix('/') {
            Some(rest) if !rest.is_empty() && !rest.starts_with(char::is_whitespace) => {
                let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let name = head.split('@').next().unwrap_or(head).to_lowercase();
                EventKind::Command {
                    name,
                    args: args.trim().to_string(),
                }
            }
            _ => EventKind::Text(text.to_string()),
        };
        Self { user_id, chat_id, kind }
    }

    pub fn choice(user_id: i64, chat_id: i64, token: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            user_id,
            chat_id,
            kind: EventKind::Choice {
                token: token.into(),
                message_id,
            },
        }
    }
}

/// Errors from chat surfaces
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API error: {0}")]
    Api(String),

    #[error("Console error: {0}")]
    Console(String),

    #[error("Connector closed")]
    Closed,
}
