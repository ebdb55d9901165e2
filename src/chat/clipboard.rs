//! Clipboard access for the copy commands.

use crate::error::{Result, VidchatError};
use std::sync::Mutex;
use tracing::debug;

/// Anything that can take text for the user to paste elsewhere.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
}

/// The desktop clipboard.
///
/// The arboard handle is opened lazily and kept: on X11 the copied text is
/// served by the process that owns the handle.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| VidchatError::Clipboard("clipboard lock poisoned".to_string()))?;

        if guard.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| VidchatError::Clipboard(e.to_string()))?;
            *guard = Some(clipboard);
        }

        let clipboard = guard
            .as_mut()
            .ok_or_else(|| VidchatError::Clipboard("clipboard unavailable".to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| VidchatError::Clipboard(e.to_string()))?;

        debug!("Copied {} chars to clipboard", text.len());
        Ok(())
    }
}
