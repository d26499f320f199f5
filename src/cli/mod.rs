pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lectio")]
#[command(about = "Read the Bible and track your progress", long_about = None)]
pub struct Cli {
    /// Path to an alternate config file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Path to an alternate database
    #[arg(long, global = true)]
    pub db: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a chapter
    Read {
        /// Book code, e.g. GEN or jhn
        book: String,
        /// Chapter number
        chapter: u16,
        /// Verse to mark
        #[arg(long)]
        verse: Option<u16>,
        /// Version id to read in
        #[arg(long)]
        version: Option<String>,
    },
    /// Finish the last chapter read and print the next one
    Next,
    /// Print the chapter before the last one read
    Prev,
    /// List available versions
    Versions {
        /// Language code (default: from config)
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Set the default version
    DefaultVersion {
        /// Version id
        id: String,
    },
    /// Search verse text
    Search {
        query: String,
        /// Maximum number of results (default: from config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show or clear search history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Show reading statistics
    Stats,
    /// List the books of the canon
    Books,
    /// Launch the TUI
    Tui,
}
