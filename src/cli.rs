// src/cli.rs

use clap::{Args, Parser, Subcommand};
use imap_mailstore::cfg::{DeletePolicy, RenamePolicy};
use std::path::PathBuf;

/// Command-line interface options for imap-mailstore.
#[derive(Parser, Debug)]
#[command(
    name = "imap-mailstore",
    version = env!("CARGO_PKG_VERSION"),
    about = "IMAP mailbox engine tools",
    long_about = None
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, env = "IMAP_MAILSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override rename-policy (preserve | reset)
    #[arg(long)]
    pub rename_policy: Option<RenamePolicy>,

    /// Override delete-policy (keep-children | subtree | refuse-with-children)
    #[arg(long)]
    pub delete_policy: Option<DeletePolicy>,

    #[arg(short, long, help = "turn on debug logging")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and print the resolved configuration
    Check,

    /// Load message files into a scratch mailbox and print the ones matching
    Search(SearchArgs),

    /// Load message files into a scratch mailbox and print its status
    Stats {
        /// RFC 5322 message files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// RFC 5322 message files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Substring of the From header
    #[arg(long)]
    pub from: Vec<String>,

    /// Substring of the To header
    #[arg(long)]
    pub to: Vec<String>,

    /// Substring of the Subject header
    #[arg(long)]
    pub subject: Vec<String>,

    /// Substring of the decoded body
    #[arg(long)]
    pub body: Vec<String>,

    /// Substring of any header or the body
    #[arg(long)]
    pub text: Vec<String>,

    /// NAME:VALUE header criterion; an empty VALUE tests presence
    #[arg(long)]
    pub header: Vec<String>,

    /// Internal date on or after (YYYY-MM-DD or <n>d)
    #[arg(long)]
    pub since: Option<String>,

    /// Internal date before (YYYY-MM-DD or <n>d)
    #[arg(long)]
    pub before: Option<String>,

    /// Larger than this many bytes
    #[arg(long)]
    pub larger: Option<u32>,

    /// Smaller than this many bytes
    #[arg(long)]
    pub smaller: Option<u32>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
