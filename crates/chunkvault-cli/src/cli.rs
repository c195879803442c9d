use std::path::PathBuf;

use chunkvault_types::RecordId;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chunkvault",
    about = "ChunkVault: chunked, lazily loaded lists with incremental persistence",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Record log file backing the list
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Directory record id of the list to operate on
    #[arg(long, global = true)]
    pub list: Option<RecordId>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty list
    Init(InitArgs),
    /// Append items to the list, creating it if needed
    Append(AppendArgs),
    /// Print the item at an index
    Get(GetArgs),
    /// Print the number of items
    Size,
    /// Print items in order
    List(ListArgs),
    /// Remove every item and delete the orphaned chunks
    Clear,
    /// Show list and store statistics
    Stat,
    /// Rewrite the record log without superseded entries
    Compact,
}

#[derive(Args)]
pub struct InitArgs {
    /// Items per chunk (defaults to the configured chunk size)
    #[arg(long)]
    pub chunk_size: Option<u32>,
}

#[derive(Args)]
pub struct AppendArgs {
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub index: u64,
}

#[derive(Args)]
pub struct ListArgs {
    /// Index of the first item to print
    #[arg(long, default_value = "0")]
    pub offset: u64,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}
