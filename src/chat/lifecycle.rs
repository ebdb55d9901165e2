//! Conversation lifecycle: from URL to an active chat.
//!
//! ```text
//! started -> subtitle-selected -> chat-initializing -> chat-ready <-> chat-active
//!                 |    ^                |     ^
//!                 v    |                v     |
//!          subtitle-downloaded     chat-init-failed
//! ```
//!
//! Every transition replaces the state wholesale and bumps a generation
//! counter that effects use to spot stale results.

use crate::backend::ConversationBackend;
use crate::error::{Result, VidchatError};
use crate::subtitle::{SubtitleDownloadResult, SubtitleLanguage};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Discriminant of [`ChatState`], used for the validity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatStatus {
    Started,
    SubtitleSelected,
    SubtitleDownloaded,
    ChatInitializing,
    ChatInitFailed,
    ChatReady,
    ChatActive,
}

impl ChatStatus {
    pub const ALL: [ChatStatus; 7] = [
        ChatStatus::Started,
        ChatStatus::SubtitleSelected,
        ChatStatus::SubtitleDownloaded,
        ChatStatus::ChatInitializing,
        ChatStatus::ChatInitFailed,
        ChatStatus::ChatReady,
        ChatStatus::ChatActive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Started => "started",
            ChatStatus::SubtitleSelected => "subtitle-selected",
            ChatStatus::SubtitleDownloaded => "subtitle-downloaded",
            ChatStatus::ChatInitializing => "chat-initializing",
            ChatStatus::ChatInitFailed => "chat-init-failed",
            ChatStatus::ChatReady => "chat-ready",
            ChatStatus::ChatActive => "chat-active",
        }
    }

    /// States reachable in one step.
    pub fn next_states(&self) -> &'static [ChatStatus] {
        match self {
            ChatStatus::Started => &[ChatStatus::SubtitleSelected],
            ChatStatus::SubtitleSelected => {
                &[ChatStatus::SubtitleDownloaded, ChatStatus::ChatInitializing]
            }
            ChatStatus::SubtitleDownloaded => &[ChatStatus::SubtitleSelected],
            ChatStatus::ChatInitializing => &[ChatStatus::ChatReady, ChatStatus::ChatInitFailed],
            ChatStatus::ChatInitFailed => &[ChatStatus::ChatInitializing],
            ChatStatus::ChatReady => &[ChatStatus::ChatActive],
            ChatStatus::ChatActive => &[ChatStatus::ChatReady],
        }
    }

    pub fn can_transition_to(&self, to: ChatStatus) -> bool {
        self.next_states().contains(&to)
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when the validity table allows `from -> to`.
pub fn is_valid_transition(from: ChatStatus, to: ChatStatus) -> bool {
    from.can_transition_to(to)
}

/// The lifecycle state with the data each phase carries.
#[derive(Clone)]
pub enum ChatState {
    Started,
    SubtitleSelected {
        selected_subtitle: SubtitleLanguage,
    },
    SubtitleDownloaded {
        selected_subtitle: SubtitleLanguage,
        download_result: SubtitleDownloadResult,
    },
    ChatInitializing {
        transcript: String,
        video_name: String,
    },
    ChatInitFailed {
        transcript: String,
        video_name: String,
        error: String,
    },
    ChatReady {
        transcript: String,
        video_name: String,
        backend: Arc<dyn ConversationBackend>,
    },
    ChatActive {
        transcript: String,
        video_name: String,
        backend: Arc<dyn ConversationBackend>,
    },
}

impl ChatState {
    pub fn status(&self) -> ChatStatus {
        match self {
            ChatState::Started => ChatStatus::Started,
            ChatState::SubtitleSelected { .. } => ChatStatus::SubtitleSelected,
            ChatState::SubtitleDownloaded { .. } => ChatStatus::SubtitleDownloaded,
            ChatState::ChatInitializing { .. } => ChatStatus::ChatInitializing,
            ChatState::ChatInitFailed { .. } => ChatStatus::ChatInitFailed,
            ChatState::ChatReady { .. } => ChatStatus::ChatReady,
            ChatState::ChatActive { .. } => ChatStatus::ChatActive,
        }
    }

    /// One-line status text for the UI.
    pub fn description(&self) -> String {
        match self {
            ChatState::Started => "Waiting for subtitle selection".to_string(),
            ChatState::SubtitleSelected { selected_subtitle } => {
                format!("Selected: {} - Downloading...", selected_subtitle.name)
            }
            ChatState::SubtitleDownloaded {
                download_result, ..
            } => match download_result {
                SubtitleDownloadResult::Success { .. } => {
                    "Subtitle downloaded successfully".to_string()
                }
                SubtitleDownloadResult::Failure { error } => format!("Download failed: {}", error),
            },
            ChatState::ChatInitializing { .. } => "Initializing AI chat service...".to_string(),
            ChatState::ChatInitFailed { error, .. } => {
                format!("Failed to initialize AI chat service: {}", error)
            }
            ChatState::ChatReady { .. } => "Ready to chat! Type your first message.".to_string(),
            ChatState::ChatActive { .. } => "Chat active".to_string(),
        }
    }

    /// States that only move on through user action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatState::ChatActive { .. }
                | ChatState::SubtitleDownloaded { .. }
                | ChatState::ChatInitFailed { .. }
        )
    }

    pub fn is_error(&self) -> bool {
        match self {
            ChatState::SubtitleDownloaded {
                download_result, ..
            } => !download_result.is_success(),
            ChatState::ChatInitFailed { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Debug for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatState::Started => f.write_str("Started"),
            ChatState::SubtitleSelected { selected_subtitle } => f
                .debug_struct("SubtitleSelected")
                .field("selected_subtitle", selected_subtitle)
                .finish(),
            ChatState::SubtitleDownloaded {
                selected_subtitle,
                download_result,
            } => f
                .debug_struct("SubtitleDownloaded")
                .field("selected_subtitle", selected_subtitle)
                .field("download_result", download_result)
                .finish(),
            ChatState::ChatInitializing { video_name, .. } => f
                .debug_struct("ChatInitializing")
                .field("video_name", video_name)
                .finish_non_exhaustive(),
            ChatState::ChatInitFailed {
                video_name, error, ..
            } => f
                .debug_struct("ChatInitFailed")
                .field("video_name", video_name)
                .field("error", error)
                .finish_non_exhaustive(),
            ChatState::ChatReady { video_name, .. } => f
                .debug_struct("ChatReady")
                .field("video_name", video_name)
                .finish_non_exhaustive(),
            ChatState::ChatActive { video_name, .. } => f
                .debug_struct("ChatActive")
                .field("video_name", video_name)
                .finish_non_exhaustive(),
        }
    }
}

/// Owner of the current [`ChatState`].
pub struct ChatStateMachine {
    state: ChatState,
    generation: u64,
}

impl Default for ChatStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStateMachine {
    pub fn new() -> Self {
        Self {
            state: ChatState::Started,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn status(&self) -> ChatStatus {
        self.state.status()
    }

    /// Bumped on every transition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn transition(&mut self, next: ChatState) -> Result<()> {
        let from = self.state.status();
        let to = next.status();
        if !is_valid_transition(from, to) {
            return Err(VidchatError::InvalidTransition { from, to });
        }

        debug!("Lifecycle {} -> {}", from, to);
        self.state = next;
        self.generation += 1;
        Ok(())
    }

    pub fn transition_to_subtitle_selected(&mut self, subtitle: SubtitleLanguage) -> Result<()> {
        self.transition(ChatState::SubtitleSelected {
            selected_subtitle: subtitle,
        })
    }

    pub fn transition_to_subtitle_downloaded(
        &mut self,
        subtitle: SubtitleLanguage,
        result: SubtitleDownloadResult,
    ) -> Result<()> {
        self.transition(ChatState::SubtitleDownloaded {
            selected_subtitle: subtitle,
            download_result: result,
        })
    }

    pub fn transition_to_chat_initializing(
        &mut self,
        transcript: String,
        video_name: String,
    ) -> Result<()> {
        self.transition(ChatState::ChatInitializing {
            transcript,
            video_name,
        })
    }

    pub fn transition_to_chat_init_failed(
        &mut self,
        transcript: String,
        video_name: String,
        error: String,
    ) -> Result<()> {
        self.transition(ChatState::ChatInitFailed {
            transcript,
            video_name,
            error,
        })
    }

    pub fn transition_to_chat_ready(
        &mut self,
        transcript: String,
        video_name: String,
        backend: Arc<dyn ConversationBackend>,
    ) -> Result<()> {
        self.transition(ChatState::ChatReady {
            transcript,
            video_name,
            backend,
        })
    }

    pub fn transition_to_chat_active(
        &mut self,
        transcript: String,
        video_name: String,
        backend: Arc<dyn ConversationBackend>,
    ) -> Result<()> {
        self.transition(ChatState::ChatActive {
            transcript,
            video_name,
            backend,
        })
    }

    /// Only `chat-ready` and `chat-active` accept messages.
    pub fn can_process_messages(&self) -> bool {
        matches!(
            self.state,
            ChatState::ChatReady { .. } | ChatState::ChatActive { .. }
        )
    }

    pub fn current_transcript(&self) -> Option<&str> {
        match &self.state {
            ChatState::ChatInitializing { transcript, .. }
            | ChatState::ChatInitFailed { transcript, .. }
            | ChatState::ChatReady { transcript, .. }
            | ChatState::ChatActive { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    pub fn current_backend(&self) -> Option<Arc<dyn ConversationBackend>> {
        match &self.state {
            ChatState::ChatReady { backend, .. } | ChatState::ChatActive { backend, .. } => {
                Some(Arc::clone(backend))
            }
            _ => None,
        }
    }

    pub fn current_video_name(&self) -> Option<&str> {
        match &self.state {
            ChatState::ChatInitializing { video_name, .. }
            | ChatState::ChatInitFailed { video_name, .. }
            | ChatState::ChatReady { video_name, .. }
            | ChatState::ChatActive { video_name, .. } => Some(video_name),
            _ => None,
        }
    }

    pub fn description(&self) -> String {
        self.state.description()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_error(&self) -> bool {
        self.state.is_error()
    }
}
