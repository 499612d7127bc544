use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "showstash")]
#[command(author, version, about = "TV show catalog with TMDB enrichment")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the enrichment worker until interrupted
    Worker,

    /// Add a show by TMDB id and queue its enrichment
    Add {
        /// TMDB id of the show
        #[arg(required = true)]
        tmdb_id: i64,

        /// Placeholder name shown until enrichment completes
        #[arg(long)]
        name: Option<String>,

        /// Re-enrich even if the show already has metadata
        #[arg(long)]
        force: bool,
    },

    /// Search TMDB for TV shows by name
    Search {
        /// Search query
        #[arg(required = true)]
        query: String,
    },

    /// List shows in the catalog
    Shows {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}
