//! Postbot - audience reaction assistant
//!
//! CLI entry point: serves the Telegram bot or a console chat.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use postbot::cli::{Cli, Command};
use postbot::config::Config;
use postbot::connector::{ChatConnector, ConsoleConnector, TelegramConnector};
use postbot::controller::Controller;
use postbot::dispatch::Dispatcher;
use postbot::llm::{create_balance, create_registry};
use postbot::store::{DocumentSessionStore, MemorySessionStore, SessionStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("postbot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("postbot.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Postbot loaded config: default={}/{}",
        config.llm.default_family, config.llm.default_model
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Run) => cmd_run(config).await,
        Some(Command::Chat { user_id, ephemeral }) => cmd_chat(config, user_id, ephemeral).await,
        Some(Command::Models) => cmd_models(&config),
    }
}

/// Serve the Telegram bot until interrupted
async fn cmd_run(config: Config) -> Result<()> {
    debug!("cmd_run: called");
    config.validate().context("Invalid configuration")?;
    let token = config.telegram.token()?;

    let store: Arc<dyn SessionStore> = Arc::new(DocumentSessionStore::open(
        &config.storage.store_dir,
        config.storage.collection.clone(),
    )?);
    let registry = create_registry(&config)?;
    let balance = create_balance(&config)?;
    let telegram = Arc::new(TelegramConnector::new(&config.telegram, &token)?);
    let connector: Arc<dyn ChatConnector> = telegram.clone();

    let controller = Arc::new(Controller::new(Arc::new(config), registry, store, balance, connector)?);
    let mut dispatcher = Dispatcher::new(controller);

    println!("{} polling Telegram, Ctrl+C to stop", "postbot".bright_cyan().bold());
    tokio::select! {
        result = telegram.run(&mut dispatcher) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

/// Console chat for one user
async fn cmd_chat(config: Config, user_id: i64, ephemeral: bool) -> Result<()> {
    debug!(%user_id, ephemeral, "cmd_chat: called");
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn SessionStore> = if ephemeral {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(DocumentSessionStore::open(
            &config.storage.store_dir,
            config.storage.collection.clone(),
        )?)
    };
    let registry = create_registry(&config)?;
    let balance = create_balance(&config)?;
    let console = Arc::new(ConsoleConnector::new());
    let connector: Arc<dyn ChatConnector> = console.clone();

    let controller = Controller::new(Arc::new(config), registry, store, balance, connector)?;
    console.run(&controller, user_id).await
}

/// Print the model catalogue
fn cmd_models(config: &Config) -> Result<()> {
    debug!("cmd_models: called");
    println!("Available models:");
    println!();
    for provider in &config.providers {
        println!("  {} ({:?}, {})", provider.name.bold(), provider.protocol, provider.base_url.dimmed());
        for model in &provider.models {
            let is_default = provider.name == config.llm.default_family && *model == config.llm.default_model;
            if is_default {
                println!("    {} {}", model.green(), "(default)".dimmed());
            } else {
                println!("    {}", model);
            }
        }
        println!();
    }
    Ok(())
}
