//! Chat surfaces
//!
//! The controller talks to users only through [`ChatConnector`]. Inbound
//! events flow the other way, from a connector's receive loop into the
//! dispatcher.

mod console;
mod telegram;
mod types;

pub use console::ConsoleConnector;
pub use telegram::TelegramConnector;
pub use types::{Button, ConnectorError, EventKind, InboundEvent, Keyboard, MessageId};

use async_trait::async_trait;

/// Outbound side of a chat surface
#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Send a message, optionally with an inline keyboard
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ConnectorError>;

    /// Replace the text (and keyboard) of a sent message
    async fn edit(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError>;

    /// Replace or remove the keyboard of a sent message
    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError>;
}
