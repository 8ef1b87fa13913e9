//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "askdb")]
#[command(about = "Ask a database questions in plain language", long_about = None)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(long, global = true, env = "ASKDB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer a question
    Ask {
        /// Print the full result as JSON instead of markdown
        #[arg(long)]
        json: bool,

        /// The question; remaining words are joined with spaces
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// List user tables
    Tables,
    /// Describe the columns of a table
    Columns {
        table: String,
    },
    /// Export a YAML schema snapshot
    Schema {
        /// Output file path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
