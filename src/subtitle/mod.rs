//! Subtitle source abstraction for vidchat.
//!
//! Provides a trait-based interface for listing and retrieving caption
//! tracks, with a yt-dlp backed implementation.

pub mod convert;
pub mod youtube;
mod ytdlp;

pub use ytdlp::YtdlpSubtitleSource;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a caption track was uploaded by the creator or generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleKind {
    Uploaded,
    Auto,
}

impl std::fmt::Display for SubtitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleKind::Uploaded => write!(f, "uploaded"),
            SubtitleKind::Auto => write!(f, "auto"),
        }
    }
}

/// One selectable caption track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleLanguage {
    /// Language code as understood by yt-dlp (e.g. `en`, `fr-orig`).
    pub code: String,
    /// Human-readable language name.
    pub name: String,
    pub kind: SubtitleKind,
}

impl SubtitleLanguage {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: SubtitleKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Outcome of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleDownloadResult {
    Success { content: String, video_name: String },
    Failure { error: String },
}

impl SubtitleDownloadResult {
    pub fn failure(error: impl Into<String>) -> Self {
        SubtitleDownloadResult::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubtitleDownloadResult::Success { .. })
    }
}

/// What a source found when asked for a video's caption tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleListing {
    Languages(Vec<SubtitleLanguage>),
    /// The source could not list tracks; the message is shown to the user.
    Unavailable(String),
}

/// Trait for subtitle providers.
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    /// Check whether the source can be used at all.
    async fn is_available(&self) -> bool;

    /// List the caption tracks available for a video.
    async fn available_subtitles(&self, url: &str) -> Result<SubtitleListing>;

    /// Download a caption track and convert it to plain text.
    async fn retrieve_raw_text(
        &self,
        url: &str,
        subtitle: &SubtitleLanguage,
    ) -> Result<SubtitleDownloadResult>;
}
