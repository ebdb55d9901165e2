//! Chat input line with command completion.

use crate::chat::{command_suggestions, CommandSuggestion};

/// Editable single-line input. The cursor is a char index.
#[derive(Debug, Default)]
pub struct InputLine {
    text: String,
    cursor: usize,
    suggestions: Vec<CommandSuggestion>,
    selected: usize,
}

/// Convert a character index to a byte index for UTF-8 safe edits.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn suggestions(&self) -> &[CommandSuggestion] {
        &self.suggestions
    }

    pub fn selected_suggestion(&self) -> Option<&CommandSuggestion> {
        self.suggestions.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn insert(&mut self, c: char) {
        let idx = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(idx, c);
        self.cursor += 1;
        self.refresh_suggestions();
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| !c.is_control()) {
            let idx = char_to_byte_index(&self.text, self.cursor);
            self.text.insert(idx, c);
            self.cursor += 1;
        }
        self.refresh_suggestions();
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(idx);
        self.refresh_suggestions();
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.text.chars().count() {
            return;
        }
        let idx = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(idx);
        self.refresh_suggestions();
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.refresh_suggestions();
    }

    /// Take the trimmed text, leaving the line untouched. Callers clear it
    /// once the submission is accepted.
    pub fn submission(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn select_next_suggestion(&mut self) {
        if !self.suggestions.is_empty() {
            self.selected = (self.selected + 1) % self.suggestions.len();
        }
    }

    pub fn select_prev_suggestion(&mut self) {
        if !self.suggestions.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.suggestions.len() - 1);
        }
    }

    /// Replace the input with the highlighted command. Returns false when
    /// there was nothing to complete.
    pub fn complete(&mut self) -> bool {
        let Some(suggestion) = self.selected_suggestion().copied() else {
            return false;
        };
        self.text = suggestion.command.to_string();
        self.cursor = self.text.chars().count();
        self.refresh_suggestions();
        true
    }

    fn refresh_suggestions(&mut self) {
        let suggestions = command_suggestions(&self.text);
        // A fully typed command needs no completion.
        self.suggestions = if suggestions.len() == 1 && suggestions[0].command == self.text {
            Vec::new()
        } else {
            suggestions
        };
        if self.selected >= self.suggestions.len() {
            self.selected = 0;
        }
    }
}
