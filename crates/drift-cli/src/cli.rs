use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "drift")]
#[command(about = "Offline-first notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the local data directory
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Quick capture: drift "my note here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note body text
        content: Vec<String>,
        /// Note title
        #[arg(short, long)]
        title: Option<String>,
        /// Display color tag
        #[arg(long)]
        color: Option<String>,
    },
    /// List notes in display order
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search notes
    Search {
        /// Search query
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(short, long)]
        title: Option<String>,
        /// Replace the color tag
        #[arg(long)]
        color: Option<String>,
        /// Clear the color tag
        #[arg(long, conflicts_with = "color")]
        clear_color: bool,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Apply a manual order; pass every note id (or unique prefix) in the
    /// new order
    Reorder {
        /// Note IDs in the desired order
        ids: Vec<String>,
    },
    /// Reconcile the local collection with the remote store
    Sync,
    /// Show identity, remote configuration, and collection counts
    Status,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
