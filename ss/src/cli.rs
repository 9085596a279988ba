//! CLI argument parsing for sessionstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect and manage stored postbot sessions", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Collection to operate on
    #[arg(long, default_value = crate::USERS_COLLECTION)]
    pub collection: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List documents in the collection
    List,

    /// Print a document as pretty JSON
    Show {
        /// Document ID (user id for sessions)
        #[arg(required = true)]
        id: String,
    },

    /// Delete a document
    Delete {
        /// Document ID to delete
        #[arg(required = true)]
        id: String,
    },

    /// Export every document of the collection as JSON lines
    Export,
}
