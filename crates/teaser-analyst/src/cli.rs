use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "teaser-analyst")]
#[command(about = "Analyze private-equity teaser PDFs and produce screening reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(long, global = true, env = "TEASER_ANALYST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Store a teaser PDF and register it for processing
    Upload {
        /// Path to the PDF
        path: PathBuf,
    },

    /// Extract, analyze and render the report for a teaser
    Process {
        /// Teaser id
        id: String,

        /// Building blocks to analyze (defaults to all)
        #[arg(long, value_delimiter = ',')]
        blocks: Option<Vec<String>>,

        /// Print progress events while the run is going
        #[arg(long)]
        watch: bool,
    },

    /// List all teasers, newest first
    List,

    /// Show one teaser
    Show {
        /// Teaser id
        id: String,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a running teaser as failed
    Cancel {
        /// Teaser id
        id: String,
    },

    /// Delete a teaser with its upload and report
    Delete {
        /// Teaser id
        id: String,
    },

    /// List the available building blocks
    Blocks,
}
