//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hybridrag",
    version,
    author = "neur0map",
    about = "Hybrid BM25 + vector retrieval for question answering",
    long_about = "hybridrag expands a question into related variants, retrieves matching passages \
                  from a small corpus with both BM25 keyword ranking and embedding similarity, \
                  and emits the merged evidence set for answer synthesis."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/hybridrag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply from the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed the corpus and persist the vector index
    BuildIndex {
        /// Corpus file (JSON array of strings); overrides config
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Output path for the vector index; overrides config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Retrieve the evidence set for a question
    Retrieve {
        /// Question to retrieve evidence for
        question: String,

        /// Results taken from each index per question variant
        #[arg(short = 'k', long, value_parser = parse_top_k)]
        top_k: Option<usize>,

        /// Disable query expansion
        #[arg(long)]
        no_expansion: bool,

        /// Print the joined context block instead of JSON
        #[arg(long)]
        context: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the global config path)
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_top_k(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("top-k must be at least 1".to_string()),
        Ok(k) => Ok(k),
        Err(e) => Err(e.to_string()),
    }
}
