//! Subtitle track picker.

use crate::error::Result;
use crate::subtitle::{SubtitleLanguage, SubtitleListing};
use ratatui::widgets::ListState;

#[derive(Debug)]
pub enum PickerState {
    Loading,
    Error(String),
    Empty,
    Ready(Vec<SubtitleLanguage>),
}

#[derive(Debug)]
pub struct SubtitlePicker {
    state: PickerState,
    list: ListState,
}

impl Default for SubtitlePicker {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtitlePicker {
    pub fn new() -> Self {
        Self {
            state: PickerState::Loading,
            list: ListState::default(),
        }
    }

    pub fn state(&self) -> &PickerState {
        &self.state
    }

    pub fn list_state_mut(&mut self) -> &mut ListState {
        &mut self.list
    }

    /// Take the result of the listing request.
    pub fn load(&mut self, listing: Result<SubtitleListing>) {
        self.state = match listing {
            Ok(SubtitleListing::Languages(langs)) if langs.is_empty() => PickerState::Empty,
            Ok(SubtitleListing::Languages(langs)) => {
                self.list.select(Some(0));
                PickerState::Ready(langs)
            }
            Ok(SubtitleListing::Unavailable(message)) => PickerState::Error(message),
            Err(e) => PickerState::Error(e.to_string()),
        };
    }

    pub fn next(&mut self) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let i = self.list.selected().map(|i| (i + 1) % len).unwrap_or(0);
        self.list.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let i = match self.list.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list.select(Some(i));
    }

    pub fn selected(&self) -> Option<&SubtitleLanguage> {
        match &self.state {
            PickerState::Ready(langs) => self.list.selected().and_then(|i| langs.get(i)),
            _ => None,
        }
    }

    fn len(&self) -> usize {
        match &self.state {
            PickerState::Ready(langs) => langs.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VidchatError;
    use crate::subtitle::SubtitleKind;

    fn langs() -> Vec<SubtitleLanguage> {
        vec![
            SubtitleLanguage::new("en", "English", SubtitleKind::Uploaded),
            SubtitleLanguage::new("fr", "French", SubtitleKind::Uploaded),
            SubtitleLanguage::new("de", "German", SubtitleKind::Uploaded),
        ]
    }

    #[test]
    fn test_navigation_wraps() {
        let mut picker = SubtitlePicker::new();
        assert!(picker.selected().is_none());

        picker.load(Ok(SubtitleListing::Languages(langs())));
        assert_eq!(picker.selected().unwrap().code, "en");

        picker.previous();
        assert_eq!(picker.selected().unwrap().code, "de");
        picker.next();
        picker.next();
        assert_eq!(picker.selected().unwrap().code, "fr");
    }

    #[test]
    fn test_load_outcomes() {
        let mut picker = SubtitlePicker::new();
        picker.load(Ok(SubtitleListing::Languages(Vec::new())));
        assert!(matches!(picker.state(), PickerState::Empty));

        picker.load(Ok(SubtitleListing::Unavailable("No subtitle information found".into())));
        assert!(matches!(picker.state(), PickerState::Error(m) if m.contains("No subtitle")));

        picker.load(Err(VidchatError::ToolNotFound("yt-dlp".into())));
        assert!(matches!(picker.state(), PickerState::Error(m) if m.contains("yt-dlp")));
        picker.next();
        assert!(picker.selected().is_none());
    }
}
