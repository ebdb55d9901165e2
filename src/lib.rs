//! vidchat - Chat with YouTube videos from the terminal
//!
//! Downloads a video's subtitles with yt-dlp, turns them into a plain
//! transcript and opens a streaming AI conversation grounded in it.
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `subtitle` - Subtitle listing, download and conversion
//! - `provider` - AI provider detection and model selection
//! - `backend` - Conversation backends over a chat completions API
//! - `chat` - Chat lifecycle, effects, message handling and the session
//! - `tui` - Terminal user interface
//! - `cli` - Command line parsing, pre-flight checks and subcommands
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vidchat::backend::ProviderBackendFactory;
//! use vidchat::chat::{ChatSession, MessageHandler, SessionOptions};
//! use vidchat::config::{Prompts, Settings};
//! use vidchat::subtitle::YtdlpSubtitleSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let source = Arc::new(YtdlpSubtitleSource::new(&settings.subtitles, settings.temp_dir()));
//!     let factory = Arc::new(ProviderBackendFactory::new(
//!         Prompts::load(None, None)?,
//!         settings.request_timeout(),
//!     ));
//!
//!     let mut session = ChatSession::new(
//!         "https://youtu.be/dQw4w9WgXcQ".to_string(),
//!         source,
//!         factory,
//!         MessageHandler::new(),
//!         SessionOptions::default(),
//!     );
//!     println!("{}", session.status());
//!     session.settle().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod subtitle;
pub mod tui;

pub use error::{Result, VidchatError};
