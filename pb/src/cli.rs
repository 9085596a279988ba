//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Postbot - audience reaction assistant
#[derive(Parser)]
#[command(
    name = "pb",
    about = "Chat assistant that predicts how an audience will react to a post",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the Telegram bot (default)
    Run,

    /// Talk to the assistant from the terminal
    Chat {
        /// User id the console session is stored under
        #[arg(short, long, default_value_t = 1)]
        user_id: i64,

        /// Keep the session in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// List provider families and their models
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["pb"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_chat_options() {
        let cli = Cli::parse_from(["pb", "-l", "debug", "chat", "--user-id", "42", "--ephemeral"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Some(Command::Chat { user_id, ephemeral }) => {
                assert_eq!(user_id, 42);
                assert!(ephemeral);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
