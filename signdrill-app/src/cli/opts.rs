use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::StoreKind;
use crate::vocab::Difficulty;

#[derive(Debug, Parser, Clone)]
#[command(name = "signdrill", version, about = "SignDrill spaced-repetition CLI/API")]
pub struct Cli {
    /// Storage backend (overrides the config file)
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Store file: the SQLite database or the JSON file (defaults to app data dir)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Config file (defaults to signdrill.toml in the app config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Max new cards per session
    #[arg(long)]
    pub new_limit: Option<usize>,

    /// Max cards per session
    #[arg(long)]
    pub total_limit: Option<usize>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// List cards due for review, most overdue first
    Due {
        #[arg(long, default_value_t = signdrill_core::DEFAULT_DUE_LIMIT)]
        limit: usize,
    },
    /// Run one interactive study session
    Study,
    /// Record a single review outside a session
    Review(ReviewCmd),
    /// Deck and review statistics
    Stats,
    /// Add the built-in starter vocabulary
    Seed {
        /// Only signs of this level
        #[arg(long, value_enum)]
        level: Option<Difficulty>,
    },
    /// Per-sign mastery report
    Progress,
    /// Return every card to new and delete the review history
    Reset {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },
    /// Export data
    #[command(subcommand)]
    Export(ExportCmd),
    /// Import data
    #[command(subcommand)]
    Import(ImportCmd),
    /// Launch Axum HTTP API
    Api(ApiCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add(CardRef),
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "query")]
        query: Option<String>,
        /// Only starter signs of this level
        #[arg(long, value_enum)]
        level: Option<Difficulty>,
    },
}

#[derive(Debug, Args, Clone)]
pub struct CardRef {
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub word: String,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[command(flatten)]
    pub card: CardRef,
    /// Recall quality, 0 (total failure) to 5 (perfect)
    #[arg(long)]
    pub quality: u8,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json { path: PathBuf },
    Csv { path: PathBuf },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ImportCmd {
    /// A file written by `export json`
    Json { path: PathBuf },
    /// Rows of `category,word` (header required)
    Csv { path: PathBuf },
    /// The browser client's saved card map
    Browser { path: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port); overrides the config file
    #[arg(long)]
    pub addr: Option<String>,
}
