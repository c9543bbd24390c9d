//! CLI entry point for Parley.

use clap::{Parser, Subcommand};

/// Parley CLI
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Stream chat completions from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a model
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model to use (format: provider:model, e.g., anthropic:claude-3-5-sonnet-20240620;
    /// a bare `azure` uses the deployment from AZURE_OPENAI_* settings)
    #[arg(short, long, default_value = "openai:gpt-4o")]
    pub model: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Ask for a JSON response
    #[arg(long)]
    pub json: bool,

    /// Load credentials from this dotenv file instead of the environment
    #[arg(long)]
    pub env_file: Option<std::path::PathBuf>,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
