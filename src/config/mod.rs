pub mod file;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use file::Credentials;

#[derive(Debug, Parser)]
#[command(name = "fedilist", version)]
#[command(about = "A simple CLI for managing Mastodon follows and lists")]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Enable verbose output.
    #[arg(long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow an account.
    Follow { account: String },
    /// Unfollow an account.
    Unfollow { account: String },
    /// Print the full address of the configured account.
    Whoami,
    /// Export accounts being followed or a list to CSV.
    #[command(subcommand)]
    Export(ExportCommand),
    /// Import a following CSV or list CSV.
    #[command(subcommand)]
    Import(ImportCommand),
}

#[derive(Debug, Subcommand)]
pub enum ExportCommand {
    /// Export the list of accounts being followed.
    Following {
        /// The full address of the account.
        #[arg(short, long)]
        account: Option<String>,
        /// Only output accounts that are not in any list.
        #[arg(short, long)]
        unlisted: bool,
        /// A file path to write to.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Export the list of follower accounts.
    Followers {
        /// The full address of the account.
        #[arg(short, long)]
        account: Option<String>,
        /// A file path to write to.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Export a list.
    List {
        /// The name of a list. Omit to show a list of lists. Use all to
        /// export every list to its own CSV file.
        #[arg(short, long)]
        name: Option<String>,
        /// A path to write to.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ImportCommand {
    /// Import a CSV list of accounts to follow.
    Following {
        file: PathBuf,
        /// Unfollow all accounts before importing the list.
        #[arg(long)]
        replace: bool,
    },
    /// Add accounts from a CSV to a list.
    List {
        file: PathBuf,
        list_name: String,
        /// Remove all existing accounts from the list before importing.
        #[arg(long)]
        replace: bool,
    },
}
