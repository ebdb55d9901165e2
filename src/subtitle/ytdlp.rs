//! yt-dlp backed subtitle source.

use super::convert::{to_plain_text, SubtitleFormat};
use super::youtube::extract_video_id;
use super::{SubtitleDownloadResult, SubtitleKind, SubtitleLanguage, SubtitleListing, SubtitleSource};
use crate::config::SubtitleSettings;
use crate::error::{Result, VidchatError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Subtitle source that shells out to yt-dlp.
pub struct YtdlpSubtitleSource {
    binary: String,
    sub_format: String,
    temp_dir: PathBuf,
}

impl YtdlpSubtitleSource {
    pub fn new(settings: &SubtitleSettings, temp_dir: PathBuf) -> Self {
        Self {
            binary: settings.ytdlp_path.clone(),
            sub_format: settings.sub_format.clone(),
            temp_dir,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let result = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VidchatError::ToolNotFound(self.binary.clone()))
            }
            Err(e) => Err(VidchatError::ToolFailed(format!("Failed to run yt-dlp: {e}"))),
        }
    }

    async fn download(
        &self,
        url: &str,
        subtitle: &SubtitleLanguage,
        dir: &Path,
    ) -> Result<std::result::Result<(PathBuf, String), String>> {
        let template = dir.join("%(id)s.%(ext)s");
        let template = template.to_string_lossy();
        let write_flag = match subtitle.kind {
            SubtitleKind::Uploaded => "--write-subs",
            SubtitleKind::Auto => "--write-auto-subs",
        };

        let output = self
            .run(&[
                "--skip-download",
                write_flag,
                "--sub-langs",
                &subtitle.code,
                "--sub-format",
                &self.sub_format,
                "--no-playlist",
                "--no-warnings",
                "--print",
                "title",
                "--no-simulate",
                "--output",
                &template,
                url,
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(Err(format!(
                "Failed to download subtitle: {}",
                stderr.trim()
            )));
        }

        let title = String::from_utf8_lossy(&output.stdout)
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .or_else(|| extract_video_id(url))
            .unwrap_or_else(|| "unknown-video".to_string());

        match find_subtitle_file(dir).await? {
            Some(path) => Ok(Ok((path, title))),
            None => Ok(Err("Download failed: unable to download subtitle".to_string())),
        }
    }
}

#[async_trait]
impl SubtitleSource for YtdlpSubtitleSource {
    async fn is_available(&self) -> bool {
        matches!(self.run(&["--version"]).await, Ok(output) if output.status.success())
    }

    #[instrument(skip(self))]
    async fn available_subtitles(&self, url: &str) -> Result<SubtitleListing> {
        let output = self
            .run(&["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", url])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidchatError::SubtitleSource(format!(
                "Failed to get subtitles: {}",
                stderr.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            VidchatError::SubtitleSource(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        let listing = parse_listing(&json);
        if let SubtitleListing::Languages(langs) = &listing {
            info!("Found {} subtitle tracks", langs.len());
        }
        Ok(listing)
    }

    #[instrument(skip(self), fields(code = %subtitle.code, kind = %subtitle.kind))]
    async fn retrieve_raw_text(
        &self,
        url: &str,
        subtitle: &SubtitleLanguage,
    ) -> Result<SubtitleDownloadResult> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("subs-")
            .tempdir_in(&self.temp_dir)?;

        let (path, video_name) = match self.download(url, subtitle, dir.path()).await? {
            Ok(found) => found,
            Err(error) => {
                warn!("{}", error);
                return Ok(SubtitleDownloadResult::Failure { error });
            }
        };

        Ok(convert_file(&path, video_name).await)
    }
}

/// Read a downloaded caption file and turn it into a transcript.
async fn convert_file(path: &Path, video_name: String) -> SubtitleDownloadResult {
    debug!("Converting {:?} to text", path);
    let Some(format) = SubtitleFormat::from_path(path) else {
        return SubtitleDownloadResult::failure(format!(
            "Failed to transform subtitle to text: unsupported file {}",
            path.display()
        ));
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let raw = String::from_utf8_lossy(&bytes);
            let content = to_plain_text(&raw, format);
            info!("Subtitle converted ({} chars)", content.len());
            SubtitleDownloadResult::Success {
                content,
                video_name,
            }
        }
        Err(e) => SubtitleDownloadResult::failure(format!(
            "Failed to transform subtitle to text: {}",
            e
        )),
    }
}

/// Locate the caption file yt-dlp wrote into the download directory.
async fn find_subtitle_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if SubtitleFormat::from_path(&path).is_some() {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Build the track list from `yt-dlp --dump-json` output.
///
/// Creator-uploaded tracks win. Otherwise only the `-orig` automatic
/// captions are offered, since the rest are machine translations.
fn parse_listing(json: &serde_json::Value) -> SubtitleListing {
    let uploaded = collect_tracks(&json["subtitles"], SubtitleKind::Uploaded, |code| {
        code != "live_chat"
    });
    if !uploaded.is_empty() {
        return SubtitleListing::Languages(uploaded);
    }

    let auto = collect_tracks(&json["automatic_captions"], SubtitleKind::Auto, |code| {
        code.ends_with("-orig")
    });
    if !auto.is_empty() {
        return SubtitleListing::Languages(auto);
    }

    SubtitleListing::Unavailable("No subtitle information found".to_string())
}

fn collect_tracks(
    tracks: &serde_json::Value,
    kind: SubtitleKind,
    keep: impl Fn(&str) -> bool,
) -> Vec<SubtitleLanguage> {
    let Some(map) = tracks.as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter(|(code, _)| keep(code.as_str()))
        .map(|(code, formats)| {
            let name = formats
                .as_array()
                .and_then(|f| f.iter().find_map(|fmt| fmt["name"].as_str()))
                .unwrap_or(code.as_str())
                .to_string();
            SubtitleLanguage::new(code.clone(), name, kind)
        })
        .collect()
}
