//! CLI argument parsing for the pestdesk-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pestdesk-worker", about = "PestDesk backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Import scheduled visits from a spreadsheet
    Import {
        /// Path to a .csv or .xlsx file
        #[arg(long)]
        file: PathBuf,
        /// User the visits are imported for
        #[arg(long)]
        user: Uuid,
    },
}
