use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::store::StoreKind;

/// Crawl command arguments
///
/// Every flag overrides the matching configuration value for this run only.
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Maximum number of result pages to scan
    #[arg(short = 'p', long)]
    pub max_pages: Option<u32>,

    /// Download the PDF attachments of each bill
    #[arg(short, long)]
    pub download: bool,

    /// Storage backend
    #[arg(short, long, value_enum)]
    pub backend: Option<StoreKind>,

    /// Directory holding the store and downloaded documents
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Delay between result pages in milliseconds
    #[arg(long)]
    pub page_delay_ms: Option<u64>,

    /// Council site base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Bill category filter (e.g. PLL)
    #[arg(long)]
    pub category: Option<String>,
}

/// List command arguments
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Storage backend
    #[arg(short, long, value_enum)]
    pub backend: Option<StoreKind>,

    /// Directory holding the store
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Show at most this many records
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Summarize command arguments
#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Plain text files holding bill text
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for `<input-stem>.summary.json` files
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Gemini model name
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., crawl.max_pages, summary.key)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List every known key with its current value
    List,

    /// Show configuration file path
    Path,

    /// Initialize configuration
    Init,
}
