//! Telegram Bot API connector (long polling)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{ChatConnector, ConnectorError, InboundEvent, Keyboard, MessageId};
use crate::config::TelegramConfig;
use crate::dispatch::Dispatcher;

/// Bot API limit on message text length, in characters
const MAX_MESSAGE_CHARS: usize = 4096;

/// Pause after a failed poll
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(3);

pub struct TelegramConnector {
    http: Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramConnector {
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self, ConnectorError> {
        // The HTTP timeout must outlast the long-poll timeout
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), token),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, ConnectorError> {
        debug!(%method, "TelegramConnector::call: called");
        let reply: ApiReply<T> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match reply {
            ApiReply {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiReply { description, .. } => Err(ConnectorError::Api(
                description.unwrap_or_else(|| format!("{} failed", method)),
            )),
        }
    }

    /// Edits that change nothing are not failures
    fn tolerate_unmodified(result: Result<Value, ConnectorError>) -> Result<(), ConnectorError> {
        match result {
            Ok(_) => Ok(()),
            Err(ConnectorError::Api(description)) if description.contains("message is not modified") => {
                debug!("tolerate_unmodified: edit was a no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Poll for updates forever, feeding them to the dispatcher
    pub async fn run(&self, dispatcher: &mut Dispatcher) -> Result<(), ConnectorError> {
        info!("Telegram polling started");
        let mut offset: i64 = 0;
        loop {
            let body = json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            });
            let updates: Vec<Update> = match self.call("getUpdates", body).await {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "run: getUpdates failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(callback) = &update.callback_query {
                    // Stop the client-side spinner; failure only affects cosmetics
                    let answer = json!({ "callback_query_id": callback.id });
                    if let Err(e) = self.call::<Value>("answerCallbackQuery", answer).await {
                        debug!(error = %e, "run: answerCallbackQuery failed");
                    }
                }
                let Some(event) = update.into_event() else { continue };
                let chat_id = event.chat_id;
                if let Err(e) = dispatcher.dispatch(event)
                    && let Err(send_err) = self.send(chat_id, &e.user_message(), None).await
                {
                    warn!(%chat_id, error = %send_err, "run: failed to report busy queue");
                }
            }
        }
    }
}

/// `reply_markup` for an inline keyboard, one button per row
fn reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .buttons
        .iter()
        .map(|b| json!([{ "text": b.label, "callback_data": b.token }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Split text into chunks the Bot API accepts, preferring line breaks
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChatConnector for TelegramConnector {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ConnectorError> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let last = chunks.len() - 1;
        let mut message_id = MessageId(0);
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut body = json!({ "chat_id": chat_id, "text": chunk });
            // Buttons go on the last chunk
            if idx == last
                && let Some(keyboard) = keyboard
            {
                body["reply_markup"] = reply_markup(keyboard);
            }
            let sent: TgMessage = self.call("sendMessage", body).await?;
            message_id = MessageId(sent.message_id);
        }
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id.0, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        Self::tolerate_unmodified(self.call("editMessageText", body).await)
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id.0 });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        Self::tolerate_unmodified(self.call("editMessageReplyMarkup", body).await)
    }
}

// Bot API types

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
    callback_query: Option<CallbackQuery>,
}

impl Update {
    fn into_event(self) -> Option<InboundEvent> {
        if let Some(callback) = self.callback_query {
            let message = callback.message?;
            let token = callback.data?;
            return Some(InboundEvent::choice(
                callback.from.id,
                message.chat.id,
                token,
                MessageId(message.message_id),
            ));
        }
        let message = self.message?;
        let user_id = message.from?.id;
        let text = message.text?;
        Some(InboundEvent::from_text(user_id, message.chat.id, &text))
    }
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: TgUser,
    message: Option<TgMessage>,
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Button, EventKind};

    #[test]
    fn test_reply_markup_one_button_per_row() {
        let keyboard = Keyboard::new(vec![Button::new("A", "option:platform:A"), Button::new("B", "option:platform:B")]);
        let markup = reply_markup(&keyboard);
        assert_eq!(markup["inline_keyboard"].as_array().unwrap().len(), 2);
        assert_eq!(markup["inline_keyboard"][1][0]["callback_data"], "option:platform:B");
    }

    #[test]
    fn test_message_update_to_event() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "from": {"id": 77, "is_bot": false, "first_name": "A"},
                "chat": {"id": 77, "type": "private"},
                "date": 0,
                "text": "/analyze@postbot"
            }
        }))
        .unwrap();

        let event = update.into_event().unwrap();
        assert_eq!(event.user_id, 77);
        assert!(matches!(event.kind, EventKind::Command { ref name, .. } if name == "analyze"));
    }

    #[test]
    fn test_callback_update_to_event() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 77, "is_bot": false, "first_name": "A"},
                "message": {"message_id": 5, "chat": {"id": -100, "type": "group"}, "date": 0},
                "chat_instance": "x",
                "data": "family:Gemini"
            }
        }))
        .unwrap();

        let event = update.into_event().unwrap();
        assert_eq!(event.chat_id, -100);
        assert_eq!(
            event.kind,
            EventKind::Choice {
                token: "family:Gemini".to_string(),
                message_id: MessageId(5)
            }
        );
    }

    #[test]
    fn test_non_text_message_ignored() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 12,
            "message": {"message_id": 1, "from": {"id": 1}, "chat": {"id": 1}, "photo": []}
        }))
        .unwrap();
        assert!(update.into_event().is_none());
    }

    #[test]
    fn test_split_message() {
        assert_eq!(split_message("short", 10), vec!["short"]);
        assert_eq!(split_message("", 10), vec![""]);

        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(text, 10), vec!["aaaa\nbbbb\n", "cccc"]);

        let long = "я".repeat(25);
        let chunks = split_message(&long, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_tolerate_unmodified() {
        let err = Err(ConnectorError::Api(
            "Bad Request: message is not modified: specified new message content".to_string(),
        ));
        assert!(TelegramConnector::tolerate_unmodified(err).is_ok());
        assert!(TelegramConnector::tolerate_unmodified(Err(ConnectorError::Api("chat not found".to_string()))).is_err());
    }
}
