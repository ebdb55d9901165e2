//! CLI module for vidchat.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::provider::Provider;
use clap::{Parser, Subcommand};

/// vidchat - Chat with a YouTube video's transcript
///
/// Pick a subtitle track, and vidchat downloads it with yt-dlp and opens an
/// AI chat grounded in what the video says.
#[derive(Parser, Debug)]
#[command(name = "vidchat")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// YouTube video URL
    pub url: Option<String>,

    /// Stay on the "ready" screen until the first message is sent
    #[arg(long)]
    pub no_auto_transition: bool,

    /// AI provider to use instead of detecting one from the environment
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// Model to use instead of the provider's default
    #[arg(short, long)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the configuration file path
    Path,
}
