//! Caption file to plain text conversion.
//!
//! Strips cue numbers, timestamps, headers and inline markup, leaving one
//! caption line per output line.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Inline markup: `<c>`, `</c>`, `<i>`, `<00:00:01.500>` and friends.
static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Supported caption formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "srt" => Some(SubtitleFormat::Srt),
            "vtt" => Some(SubtitleFormat::Vtt),
            _ => None,
        }
    }
}

/// Convert caption file content to plain text.
pub fn to_plain_text(content: &str, format: SubtitleFormat) -> String {
    let lines = match format {
        SubtitleFormat::Srt => srt_lines(content),
        SubtitleFormat::Vtt => vtt_lines(content),
    };
    dedup_consecutive(lines).join("\n")
}

fn srt_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_sequence_number(line))
        .filter(|line| !is_timestamp_line(line))
        .filter_map(clean_line)
        .collect()
}

fn vtt_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_cue = false;

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() {
            in_cue = false;
            continue;
        }

        if is_timestamp_line(line) {
            in_cue = true;
            continue;
        }

        if in_cue && !is_vtt_header(line) {
            if let Some(cleaned) = clean_line(line) {
                lines.push(cleaned);
            }
        }
    }

    lines
}

fn clean_line(line: &str) -> Option<String> {
    let stripped = INLINE_TAG.replace_all(line, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Auto-generated captions repeat each line while it scrolls.
fn dedup_consecutive(mut lines: Vec<String>) -> Vec<String> {
    lines.dedup();
    lines
}

fn is_sequence_number(line: &str) -> bool {
    line.chars().all(|c| c.is_ascii_digit())
}

fn is_timestamp_line(line: &str) -> bool {
    line.contains("-->")
}

fn is_vtt_header(line: &str) -> bool {
    ["WEBVTT", "Kind:", "Language:"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_to_text() {
        let srt = "1\n00:00:00,000 --> 00:00:02,500\nHello world.\n\n2\n00:00:02,500 --> 00:00:05,000\nThis is a test.\nSecond line.\n";
        assert_eq!(
            to_plain_text(srt, SubtitleFormat::Srt),
            "Hello world.\nThis is a test.\nSecond line."
        );
    }

    #[test]
    fn test_srt_with_crlf_and_tags() {
        let srt = "1\r\n00:00:00,000 --> 00:00:01,000\r\n<i>Quiet</i> please\r\n\r\n";
        assert_eq!(to_plain_text(srt, SubtitleFormat::Srt), "Quiet please");
    }

    #[test]
    fn test_vtt_to_text() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000 align:start position:0%\nfirst<00:00:00.500><c> words</c>\n\n00:00:02.000 --> 00:00:04.000\nfirst words\nnext line\n";
        assert_eq!(
            to_plain_text(vtt, SubtitleFormat::Vtt),
            "first words\nnext line"
        );
    }

    #[test]
    fn test_vtt_skips_note_blocks() {
        let vtt = "WEBVTT\n\nNOTE this is a comment\n\n1\n00:00:00.000 --> 00:00:01.000\nSpoken\n";
        assert_eq!(to_plain_text(vtt, SubtitleFormat::Vtt), "Spoken");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            SubtitleFormat::from_path(Path::new("abc.en.srt")),
            Some(SubtitleFormat::Srt)
        );
        assert_eq!(
            SubtitleFormat::from_path(Path::new("abc.en-orig.VTT")),
            Some(SubtitleFormat::Vtt)
        );
        assert_eq!(SubtitleFormat::from_path(Path::new("abc.json")), None);
    }
}
