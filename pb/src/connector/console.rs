//! Interactive console chat surface

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::{ChatConnector, ConnectorError, InboundEvent, Keyboard, MessageId};
use crate::dispatch::EventHandler;

/// Terminal stand-in for a chat: one user, keyboards as numbered options
///
/// Typing `#<n>` presses button `n` of the most recent keyboard.
#[derive(Default)]
pub struct ConsoleConnector {
    next_id: AtomicI64,
    keyboard: Mutex<Option<(MessageId, Keyboard)>>,
}

impl ConsoleConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_keyboard(keyboard: &Keyboard) {
        for (idx, button) in keyboard.buttons.iter().enumerate() {
            println!("  {} {}", format!("#{}", idx + 1).yellow(), button.label);
        }
    }

    fn remember(&self, message_id: MessageId, keyboard: Option<&Keyboard>) {
        if let Ok(mut slot) = self.keyboard.lock() {
            match keyboard {
                Some(k) if !k.is_empty() => *slot = Some((message_id, k.clone())),
                _ => {
                    if slot.as_ref().is_some_and(|(id, _)| *id == message_id) {
                        *slot = None;
                    }
                }
            }
        }
    }

    /// Turn a typed line into an event
    ///
    /// `#n` selects a button of the current keyboard; an out-of-range
    /// number yields `None`.
    pub fn parse_input(&self, user_id: i64, line: &str) -> Option<InboundEvent> {
        let line = line.trim();
        if let Some(number) = line.strip_prefix('#')
            && let Ok(n) = number.trim().parse::<usize>()
        {
            let slot = self.keyboard.lock().ok()?;
            let (message_id, keyboard) = slot.as_ref()?;
            let button = keyboard.buttons.get(n.checked_sub(1)?)?;
            return Some(InboundEvent::choice(user_id, user_id, &button.token, *message_id));
        }
        Some(InboundEvent::from_text(user_id, user_id, line))
    }

    /// Read lines until EOF, handling each event before the next prompt
    pub async fn run(&self, handler: &dyn EventHandler, user_id: i64) -> eyre::Result<()> {
        println!();
        println!("{}", "Postbot console".bright_cyan().bold());
        println!(
            "Type {} to begin, {} to pick an option, Ctrl+D to quit",
            "/analyze".yellow(),
            "#<n>".yellow()
        );
        println!();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match self.parse_input(user_id, input) {
                        Some(event) => handler.handle(event).await,
                        None => println!("{}", "Нет такого варианта".red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }
}

#[async_trait]
impl ChatConnector for ConsoleConnector {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<MessageId, ConnectorError> {
        debug!(%chat_id, "ConsoleConnector::send: called");
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        println!("{}", text);
        if let Some(keyboard) = keyboard {
            Self::print_keyboard(keyboard);
        }
        self.remember(message_id, keyboard);
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError> {
        debug!(%chat_id, ?message_id, "ConsoleConnector::edit: called");
        println!("{}", text.dimmed());
        if let Some(keyboard) = keyboard {
            Self::print_keyboard(keyboard);
        }
        self.remember(message_id, keyboard);
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ConnectorError> {
        debug!(%chat_id, ?message_id, "ConsoleConnector::edit_keyboard: called");
        if let Some(keyboard) = keyboard {
            Self::print_keyboard(keyboard);
        }
        self.remember(message_id, keyboard);
        Ok(())
    }
}
