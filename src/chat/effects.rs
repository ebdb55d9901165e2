//! Effect coordinators.
//!
//! Each coordinator watches for one lifecycle state and runs a single async
//! job per entry into it. Results come back as [`EffectOutcome`]s tagged
//! with the generation that started them; [`commit`] drops any outcome whose
//! generation is no longer current.

use super::lifecycle::{ChatState, ChatStateMachine};
use super::session::SessionEvent;
use crate::backend::{BackendFactory, ConversationBackend};
use crate::error::Result;
use crate::subtitle::{SubtitleDownloadResult, SubtitleLanguage, SubtitleSource};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Result of an effect, delivered back to the session.
pub enum EffectOutcome {
    SubtitleRetrieved {
        generation: u64,
        subtitle: SubtitleLanguage,
        result: SubtitleDownloadResult,
    },
    BackendReady {
        generation: u64,
        transcript: String,
        video_name: String,
        backend: Arc<dyn ConversationBackend>,
    },
    BackendFailed {
        generation: u64,
        transcript: String,
        video_name: String,
        error: String,
    },
}

impl EffectOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            EffectOutcome::SubtitleRetrieved { generation, .. }
            | EffectOutcome::BackendReady { generation, .. }
            | EffectOutcome::BackendFailed { generation, .. } => *generation,
        }
    }
}

impl std::fmt::Debug for EffectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectOutcome::SubtitleRetrieved {
                generation, result, ..
            } => f
                .debug_struct("SubtitleRetrieved")
                .field("generation", generation)
                .field("success", &result.is_success())
                .finish(),
            EffectOutcome::BackendReady { generation, .. } => f
                .debug_struct("BackendReady")
                .field("generation", generation)
                .finish_non_exhaustive(),
            EffectOutcome::BackendFailed {
                generation, error, ..
            } => f
                .debug_struct("BackendFailed")
                .field("generation", generation)
                .field("error", error)
                .finish_non_exhaustive(),
        }
    }
}

/// Downloads the selected subtitle while in `subtitle-selected`.
pub struct SubtitleDownloadEffect {
    source: Arc<dyn SubtitleSource>,
    url: String,
    last_fired: Option<u64>,
}

impl SubtitleDownloadEffect {
    pub fn new(source: Arc<dyn SubtitleSource>, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            last_fired: None,
        }
    }

    /// Start the download if the machine just entered `subtitle-selected`.
    /// Returns whether a task was spawned.
    pub fn observe(&mut self, machine: &ChatStateMachine, tx: &UnboundedSender<SessionEvent>) -> bool {
        let ChatState::SubtitleSelected { selected_subtitle } = machine.state() else {
            return false;
        };
        let generation = machine.generation();
        if self.last_fired == Some(generation) {
            return false;
        }
        self.last_fired = Some(generation);

        let source = Arc::clone(&self.source);
        let url = self.url.clone();
        let subtitle = selected_subtitle.clone();
        let tx = tx.clone();

        info!("Downloading subtitle {} ({})", subtitle.name, subtitle.code);
        tokio::spawn(async move {
            let result = match source.retrieve_raw_text(&url, &subtitle).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Subtitle retrieval failed: {}", e);
                    SubtitleDownloadResult::failure(e.to_string())
                }
            };
            let outcome = EffectOutcome::SubtitleRetrieved {
                generation,
                subtitle,
                result,
            };
            let _ = tx.send(SessionEvent::Effect(outcome));
        });
        true
    }
}

/// Builds the conversation backend while in `chat-initializing`.
pub struct ChatServiceInitEffect {
    factory: Arc<dyn BackendFactory>,
    last_fired: Option<u64>,
}

impl ChatServiceInitEffect {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            last_fired: None,
        }
    }

    /// Start backend construction if the machine just entered
    /// `chat-initializing`. Returns whether a task was spawned.
    pub fn observe(&mut self, machine: &ChatStateMachine, tx: &UnboundedSender<SessionEvent>) -> bool {
        let ChatState::ChatInitializing {
            transcript,
            video_name,
        } = machine.state()
        else {
            return false;
        };
        let generation = machine.generation();
        if self.last_fired == Some(generation) {
            return false;
        }
        self.last_fired = Some(generation);

        let factory = Arc::clone(&self.factory);
        let transcript = transcript.clone();
        let video_name = video_name.clone();
        let tx = tx.clone();

        info!("Initializing chat service for {}", video_name);
        tokio::spawn(async move {
            let outcome = match factory.create(&transcript).await {
                Ok(backend) => EffectOutcome::BackendReady {
                    generation,
                    transcript,
                    video_name,
                    backend,
                },
                Err(e) => {
                    error!("Failed to initialize chat service: {}", e);
                    EffectOutcome::BackendFailed {
                        generation,
                        transcript,
                        video_name,
                        error: e.to_string(),
                    }
                }
            };
            let _ = tx.send(SessionEvent::Effect(outcome));
        });
        true
    }
}

/// Reported when a track downloads but holds no text.
pub const EMPTY_SUBTITLE_ERROR: &str = "Downloaded subtitle is empty";

/// Apply an outcome to the lifecycle. Returns `Ok(false)` for stale
/// outcomes, which leave the machine untouched.
pub fn commit(machine: &mut ChatStateMachine, outcome: EffectOutcome) -> Result<bool> {
    if outcome.generation() != machine.generation() {
        debug!(
            "Ignoring stale {:?} (current generation {})",
            outcome,
            machine.generation()
        );
        return Ok(false);
    }

    match outcome {
        EffectOutcome::SubtitleRetrieved {
            subtitle, result, ..
        } => match result {
            SubtitleDownloadResult::Success {
                content,
                video_name,
            } if !content.trim().is_empty() => {
                machine.transition_to_chat_initializing(content, video_name)?
            }
            SubtitleDownloadResult::Success { .. } => machine.transition_to_subtitle_downloaded(
                subtitle,
                SubtitleDownloadResult::failure(EMPTY_SUBTITLE_ERROR),
            )?,
            failure => machine.transition_to_subtitle_downloaded(subtitle, failure)?,
        },
        EffectOutcome::BackendReady {
            transcript,
            video_name,
            backend,
            ..
        } => machine.transition_to_chat_ready(transcript, video_name, backend)?,
        EffectOutcome::BackendFailed {
            transcript,
            video_name,
            error,
            ..
        } => machine.transition_to_chat_init_failed(transcript, video_name, error)?,
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::lifecycle::ChatStatus;
    use crate::error::VidchatError;
    use crate::subtitle::{SubtitleKind, SubtitleListing};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubtitleSource for CountingSource {
        async fn is_available(&self) -> bool {
            true
        }

        async fn available_subtitles(&self, _url: &str) -> Result<SubtitleListing> {
            Ok(SubtitleListing::Languages(Vec::new()))
        }

        async fn retrieve_raw_text(
            &self,
            _url: &str,
            _subtitle: &SubtitleLanguage,
        ) -> Result<SubtitleDownloadResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VidchatError::Other("Network error".to_string()))
        }
    }

    fn english() -> SubtitleLanguage {
        SubtitleLanguage::new("en", "English", SubtitleKind::Uploaded)
    }

    fn outcome(generation: u64, result: SubtitleDownloadResult) -> EffectOutcome {
        EffectOutcome::SubtitleRetrieved {
            generation,
            subtitle: english(),
            result,
        }
    }

    #[tokio::test]
    async fn test_download_fires_once_per_entry() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let mut effect = SubtitleDownloadEffect::new(source.clone(), "https://youtu.be/x");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut machine = ChatStateMachine::new();

        assert!(!effect.observe(&machine, &tx));

        machine.transition_to_subtitle_selected(english()).unwrap();
        assert!(effect.observe(&machine, &tx));
        assert!(!effect.observe(&machine, &tx));

        let Some(SessionEvent::Effect(outcome)) = rx.recv().await else {
            panic!("expected an effect outcome");
        };
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        assert!(commit(&mut machine, outcome).unwrap());
        match machine.state() {
            ChatState::SubtitleDownloaded {
                download_result, ..
            } => assert_eq!(
                *download_result,
                SubtitleDownloadResult::failure("Network error")
            ),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_commit_routes_download_results() {
        let mut machine = ChatStateMachine::new();
        machine.transition_to_subtitle_selected(english()).unwrap();
        let generation = machine.generation();
        let success = SubtitleDownloadResult::Success {
            content: "T".into(),
            video_name: "Video".into(),
        };
        assert!(commit(&mut machine, outcome(generation, success)).unwrap());
        assert_eq!(machine.status(), ChatStatus::ChatInitializing);
        assert_eq!(machine.current_transcript(), Some("T"));

        let mut machine = ChatStateMachine::new();
        machine.transition_to_subtitle_selected(english()).unwrap();
        let generation = machine.generation();
        let empty = SubtitleDownloadResult::Success {
            content: "  ".into(),
            video_name: "Video".into(),
        };
        assert!(commit(&mut machine, outcome(generation, empty)).unwrap());
        assert_eq!(machine.status(), ChatStatus::SubtitleDownloaded);
        assert!(machine.is_error());
        match machine.state() {
            ChatState::SubtitleDownloaded {
                download_result, ..
            } => assert_eq!(
                *download_result,
                SubtitleDownloadResult::failure(EMPTY_SUBTITLE_ERROR)
            ),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(
            machine.description(),
            "Download failed: Downloaded subtitle is empty"
        );
    }

    #[test]
    fn test_stale_outcome_is_ignored() {
        let mut machine = ChatStateMachine::new();
        machine.transition_to_subtitle_selected(english()).unwrap();
        let stale = machine.generation();
        machine
            .transition_to_subtitle_downloaded(english(), SubtitleDownloadResult::failure("x"))
            .unwrap();
        machine.transition_to_subtitle_selected(english()).unwrap();

        let applied = commit(
            &mut machine,
            outcome(stale, SubtitleDownloadResult::failure("old")),
        )
        .unwrap();
        assert!(!applied);
        assert_eq!(machine.status(), ChatStatus::SubtitleSelected);
    }
}
