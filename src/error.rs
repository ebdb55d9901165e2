//! Error types for vidchat.

use crate::chat::lifecycle::ChatStatus;
use thiserror::Error;

/// Library-level error type for vidchat operations.
#[derive(Error, Debug)]
pub enum VidchatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Subtitle source error: {0}")]
    SubtitleSource(String),

    #[error("No AI provider API key found. Please set one of: {0}")]
    NoProvider(String),

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: ChatStatus, to: ChatStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Errors raised by collaborators that carry their own wording.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for vidchat operations.
pub type Result<T> = std::result::Result<T, VidchatError>;
