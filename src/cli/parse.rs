//! CLI parse: clap types for Rulekeeper. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rulekeeper CLI - answer questions against a fixed set of reference documents
#[derive(Parser)]
#[command(name = "rulekeeper")]
#[command(about = "Answer questions against reference documents with tiered model fallback")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory; relative paths in the configuration resolve against it
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (takes precedence over workspace config files)
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
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question against the knowledge base
    Ask {
        /// Question text
        #[arg(required = true)]
        question: Vec<String>,
        /// Model to try first (overrides the configured primary model)
        #[arg(long)]
        model: Option<String>,
    },
    /// Replace all remote files with the documents directory and rewrite the manifest
    Sync,
    /// Upload a single file and print its URI
    Upload {
        path: PathBuf,
        /// Display name (defaults to the file name)
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Remote file commands
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// List models exposed by the API
    Models,
    /// Query the Vertex AI Search data store
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// List uploaded files
    List,
    /// Delete an uploaded file by name (e.g. files/abc-123)
    Delete { name: String },
}
