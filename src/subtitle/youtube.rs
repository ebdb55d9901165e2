//! YouTube URL handling.

use regex::Regex;
use std::sync::LazyLock;

/// Accepted watch and short-link URLs.
static WATCH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/)[\w-]+(&[\w=]*)?$")
        .expect("Invalid regex")
});

/// Extracts the 11-character video ID from the URL forms yt-dlp accepts.
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:https?://)?
        (?:www\.)?
        (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
        ([a-zA-Z0-9_-]{11})
    ",
    )
    .expect("Invalid regex")
});

/// Check whether the input is a YouTube video URL vidchat can process.
pub fn is_valid_youtube_url(url: &str) -> bool {
    WATCH_URL.is_match(url)
}

/// Extract the video ID from a YouTube URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
