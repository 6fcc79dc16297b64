//! CLI module for the insight hub
//!
//! # Commands
//!
//! - `serve` - Start the dashboard proxy server
//! - `status` - Query a running server for analytics and CRM quota
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! insight serve
//!
//! # Show analytics of a running instance
//! insight status --url http://localhost:3000
//!
//! # Generate shell completions
//! insight completions bash > ~/.bash_completion.d/insight
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod serve;
pub mod status;

pub use completions::handle_completions;
pub use config::handle_config_init;
pub use status::handle_status;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CRM Insight Hub - dashboard and debugging proxy for the CRM API
#[derive(Parser, Debug)]
#[command(
    name = "insight",
    version,
    about = "Dashboard and debugging proxy for the HighLevel CRM API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the insight server
    Serve(ServeArgs),
    /// Show analytics and rate limits of a running server
    Status(StatusArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "insight.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "INSIGHT_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "INSIGHT_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "INSIGHT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Override the CRM location id
    #[arg(long)]
    pub location_id: Option<String>,

    /// Enable LLM scoring regardless of configuration
    #[arg(long)]
    pub enable_ai: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of a running server
    #[arg(short, long, default_value = "http://localhost:3000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "5")]
    pub timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "insight.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
