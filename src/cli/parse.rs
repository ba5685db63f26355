//! CLI parse: clap types for upfile. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Upfile CLI - upload storage and derived format generation
#[derive(Parser, Debug)]
#[command(name = "upfile")]
#[command(about = "Context-driven upload storage with derived format generation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory; relative storage roots resolve against it
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured contexts
    Contexts {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Save a file as a new source in a context
    Save {
        context: String,
        file: PathBuf,
        /// Original file name (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Generate derived formats for stored data
    Generate {
        context: String,
        data: String,
        /// Format to generate; repeat for several. All formats when omitted
        #[arg(long = "format", value_name = "FORMAT")]
        formats: Vec<String>,
        /// Recompute requested formats even if already stored
        #[arg(long)]
        regenerate: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List derived formats stored for data
    Formats {
        context: String,
        data: String,
        #[arg(long)]
        json: bool,
    },
    /// Resolve the public URL of stored data
    Url {
        context: String,
        data: String,
        /// Derived format; the source when omitted
        #[arg(long)]
        format: Option<String>,
        /// relative, absolute, or an explicit scheme such as https
        #[arg(long, default_value = "relative")]
        scheme: String,
    },
    /// Delete stored data, or a single derived format
    Delete {
        context: String,
        data: String,
        #[arg(long)]
        format: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Only this context, with defaults merged in
        context: Option<String>,
    },
    /// Show the validators configured for a context
    Validators {
        context: String,
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Command name for log events.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Contexts { .. } => "contexts",
            Commands::Save { .. } => "save",
            Commands::Generate { .. } => "generate",
            Commands::Formats { .. } => "formats",
            Commands::Url { .. } => "url",
            Commands::Delete { .. } => "delete",
            Commands::Config { .. } => "config",
            Commands::Validators { .. } => "validators",
        }
    }
}
