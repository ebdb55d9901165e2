//! Configuration settings for vidchat.

use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chat: ChatSettings,
    pub subtitles: SubtitleSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary subtitle downloads.
    pub temp_dir: String,
    /// Directory for log files.
    pub log_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        let log_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|p| p.join("vidchat").to_string_lossy().to_string())
            .unwrap_or_else(|| "~/.vidchat/logs".to_string());

        Self {
            temp_dir: std::env::temp_dir()
                .join("vidchat")
                .to_string_lossy()
                .to_string(),
            log_dir,
            log_level: "info".to_string(),
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Force a provider instead of detecting one from the environment.
    pub provider: Option<Provider>,
    /// Override the provider's default model.
    pub model: Option<String>,
    /// Move from "ready" to "active" as soon as the backend is up.
    pub auto_transition: bool,
    /// Delay between the `/exit` farewell and termination.
    pub exit_delay_ms: u64,
    /// HTTP timeout for provider requests.
    pub request_timeout_secs: u64,
    /// Directory where `/save-to-file` writes chat exports.
    pub save_dir: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            auto_transition: true,
            exit_delay_ms: 1000,
            request_timeout_secs: 300,
            save_dir: ".".to_string(),
        }
    }
}

/// Subtitle retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    /// yt-dlp executable name or path.
    pub ytdlp_path: String,
    /// Subtitle format preference passed to `--sub-format`.
    pub sub_format: String,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            sub_format: "srt/vtt/best".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidchat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded log directory path.
    pub fn log_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.log_dir)
    }

    /// Get the expanded chat export directory.
    pub fn save_dir(&self) -> PathBuf {
        Self::expand_path(&self.chat.save_dir)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.chat.exit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.request_timeout_secs)
    }
}
