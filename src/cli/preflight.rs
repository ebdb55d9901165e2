//! Pre-flight checks before the UI starts.
//!
//! Validates the URL, the subtitle tool and the provider key so the user
//! gets guidance on the command line instead of a broken session.

use crate::error::{Result, VidchatError};
use crate::provider::{select_model, EnvironmentKeys, ModelConfiguration, Provider};
use crate::subtitle::youtube::is_valid_youtube_url;
use crate::subtitle::SubtitleSource;

/// Reject anything that is not a YouTube watch or short link.
pub fn check_url(url: &str) -> Result<()> {
    if is_valid_youtube_url(url.trim()) {
        Ok(())
    } else {
        Err(VidchatError::InvalidInput(format!(
            "'{}' is not a valid YouTube URL. Expected https://www.youtube.com/watch?v=<id> or https://youtu.be/<id>",
            url
        )))
    }
}

/// Check that the subtitle source can run.
pub async fn check_subtitle_source(source: &dyn SubtitleSource, tool: &str) -> Result<()> {
    if source.is_available().await {
        Ok(())
    } else {
        Err(VidchatError::ToolNotFound(tool.to_string()))
    }
}

/// Pick the provider and model the chat will use.
pub fn check_provider(
    env: &EnvironmentKeys,
    forced: Option<Provider>,
    model: Option<&str>,
) -> Result<ModelConfiguration> {
    select_model(env, forced, model)
}

/// Run every check in order, stopping at the first failure.
pub async fn check(
    url: &str,
    source: &dyn SubtitleSource,
    tool: &str,
    env: &EnvironmentKeys,
    forced: Option<Provider>,
    model: Option<&str>,
) -> Result<ModelConfiguration> {
    check_url(url)?;
    check_subtitle_source(source, tool).await?;
    check_provider(env, forced, model)
}

/// Extra guidance printed under a failed check.
pub fn hint(error: &VidchatError) -> Option<String> {
    match error {
        VidchatError::ToolNotFound(_) => Some(
            if cfg!(target_os = "macos") {
                "Install with: brew install yt-dlp"
            } else if cfg!(target_os = "linux") {
                "Install with: pip install yt-dlp (or your package manager)"
            } else {
                "Install from: https://github.com/yt-dlp/yt-dlp"
            }
            .to_string(),
        ),
        VidchatError::NoProvider(_) => Some(format!(
            "Set a key with e.g.: export {}='...'",
            Provider::PRIORITY[0].env_var()
        )),
        VidchatError::InvalidInput(_) => Some("Usage: vidchat <youtube-url>".to_string()),
        _ => None,
    }
}
