//! Configuration module for vidchat.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, Prompts};
pub use settings::{ChatSettings, GeneralSettings, PromptSettings, Settings, SubtitleSettings};
