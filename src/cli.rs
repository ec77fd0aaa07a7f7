use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Pair binaries with the metadata that references them
    Metadata,
    /// Index binaries on their own
    Binary,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a set of changed paths to the index
    Sync {
        /// Root directory of the content repository
        #[arg(long)]
        root: PathBuf,

        /// Index snapshot file, created when missing
        #[arg(long)]
        index: PathBuf,

        /// Path created or modified since the last sync (can specify multiple)
        #[arg(short = 'u', long = "update")]
        updates: Vec<String>,

        /// Path deleted since the last sync (can specify multiple)
        #[arg(short = 'd', long = "delete")]
        deletes: Vec<String>,

        /// JSON file with `update_paths` and `delete_paths` arrays
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Which indexer to run
        #[arg(long, value_enum, default_value = "metadata")]
        mode: SyncMode,

        /// Site name; cycles of the same site never overlap
        #[arg(long, default_value = "default")]
        site: String,

        /// Output format (defaults to the configured format)
        #[arg(long = "format", value_enum)]
        format: Option<OutputFormat>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file applied on top of the layered settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
