use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use sessionstore::DocumentStore;
use sessionstore::cli::{Cli, Command};
use sessionstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);

    info!("sessionstore opening {}", store_path.display());
    let store = DocumentStore::open(&store_path)?;
    let collection = cli.collection.as_str();

    match cli.command {
        Command::List => {
            let docs = store.list(collection)?;
            if docs.is_empty() {
                println!("No documents found");
            } else {
                for doc in docs {
                    let modified = doc
                        .modified
                        .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{} {} {}", doc.id.cyan(), modified.dimmed(), format!("{}B", doc.bytes).dimmed());
                }
            }
        }
        Command::Show { id } => match store.get(collection, &id)? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => return Err(eyre::eyre!("Document not found: {}/{}", collection, id)),
        },
        Command::Delete { id } => {
            if store.delete(collection, &id)? {
                println!("{} Deleted document: {}", "✓".green(), id);
            } else {
                println!("{} No such document: {}", "✗".yellow(), id);
            }
        }
        Command::Export => {
            for meta in store.list(collection)? {
                if let Some(doc) = store.get(collection, &meta.id)? {
                    println!("{}", serde_json::to_string(&doc)?);
                }
            }
        }
    }

    Ok(())
}
