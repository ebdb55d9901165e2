use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use vidchat::backend::{BackendFactory, ConversationBackend, TextStream};
use vidchat::chat::effects::commit;
use vidchat::chat::handler::STREAM_ERROR_REPLY;
use vidchat::chat::{
    ChatSession, ChatState, ChatStateMachine, ChatStatus, MessageHandler, Role, SessionEvent,
    SessionOptions, SubtitleDownloadEffect,
};
use vidchat::subtitle::{
    SubtitleDownloadResult, SubtitleKind, SubtitleLanguage, SubtitleListing, SubtitleSource,
};
use vidchat::{Result, VidchatError};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Serves one fixed download outcome.
struct FixtureSource {
    outcome: fn() -> Result<SubtitleDownloadResult>,
}

#[async_trait]
impl SubtitleSource for FixtureSource {
    async fn is_available(&self) -> bool {
        true
    }

    async fn available_subtitles(&self, _url: &str) -> Result<SubtitleListing> {
        Ok(SubtitleListing::Languages(vec![english()]))
    }

    async fn retrieve_raw_text(
        &self,
        _url: &str,
        _subtitle: &SubtitleLanguage,
    ) -> Result<SubtitleDownloadResult> {
        (self.outcome)()
    }
}

fn transcript_t() -> Result<SubtitleDownloadResult> {
    Ok(SubtitleDownloadResult::Success {
        content: "T".to_string(),
        video_name: "V".to_string(),
    })
}

fn network_error() -> Result<SubtitleDownloadResult> {
    Err(VidchatError::Other("Network error".to_string()))
}

/// Replies with fixed chunks, or fails midway when `fail_after` is set.
struct ChunkBackend {
    chunks: Vec<&'static str>,
    fail_after: Option<usize>,
}

#[async_trait]
impl ConversationBackend for ChunkBackend {
    fn system_prompt(&self) -> String {
        "system".to_string()
    }

    async fn send_message(&self, _message: &str) -> Result<TextStream> {
        let mut items: Vec<Result<String>> =
            self.chunks.iter().map(|c| Ok(c.to_string())).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(VidchatError::Provider("stream dropped".to_string())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Fails the first `failures` constructions, then succeeds.
struct FlakyFactory {
    failures: usize,
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl FlakyFactory {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            fail_after: None,
        }
    }
}

#[async_trait]
impl BackendFactory for FlakyFactory {
    async fn create(&self, _transcript: &str) -> Result<Arc<dyn ConversationBackend>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(VidchatError::Provider("service unavailable".to_string()));
        }
        Ok(Arc::new(ChunkBackend {
            chunks: vec!["Hel", "lo", "!"],
            fail_after: self.fail_after,
        }))
    }
}

fn english() -> SubtitleLanguage {
    SubtitleLanguage::new("en", "English", SubtitleKind::Uploaded)
}

fn session(
    outcome: fn() -> Result<SubtitleDownloadResult>,
    factory: FlakyFactory,
    options: SessionOptions,
) -> ChatSession {
    ChatSession::new(
        URL,
        Arc::new(FixtureSource { outcome }),
        Arc::new(factory),
        MessageHandler::new(),
        options,
    )
}

async fn settle(session: &mut ChatSession) {
    timeout(TEST_TIMEOUT, session.settle())
        .await
        .expect("session should settle")
        .expect("events should apply");
}

#[tokio::test]
async fn network_error_lands_in_subtitle_downloaded() {
    let mut s = session(network_error, FlakyFactory::new(0), SessionOptions::default());
    s.select_subtitle(english()).unwrap();
    assert_eq!(s.status(), ChatStatus::SubtitleSelected);
    settle(&mut s).await;

    match s.state() {
        ChatState::SubtitleDownloaded {
            download_result: SubtitleDownloadResult::Failure { error },
            ..
        } => assert_eq!(error, "Network error"),
        other => panic!("unexpected state {}", other.status()),
    }
    assert!(s.state().is_terminal());
    assert!(s.state().is_error());
}

#[tokio::test]
async fn happy_path_reaches_active_chat() {
    let mut s = session(transcript_t, FlakyFactory::new(0), SessionOptions::default());
    s.select_subtitle(english()).unwrap();
    settle(&mut s).await;

    assert_eq!(s.status(), ChatStatus::ChatActive);
    assert!(s.machine().can_process_messages());
    assert_eq!(s.machine().current_transcript(), Some("T"));
    assert_eq!(s.machine().current_video_name(), Some("V"));
}

#[tokio::test]
async fn stale_outcome_is_ignored() {
    let mut machine = ChatStateMachine::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut download = SubtitleDownloadEffect::new(
        Arc::new(FixtureSource {
            outcome: transcript_t,
        }),
        URL,
    );

    machine.transition_to_subtitle_selected(english()).unwrap();
    assert!(download.observe(&machine, &tx));
    assert!(!download.observe(&machine, &tx));

    // The user moves on before the download reports back.
    machine
        .transition_to_subtitle_downloaded(english(), SubtitleDownloadResult::failure("x"))
        .unwrap();
    machine.transition_to_subtitle_selected(english()).unwrap();
    let generation = machine.generation();

    let event = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    let SessionEvent::Effect(outcome) = event else {
        panic!("expected an effect outcome");
    };
    assert!(!commit(&mut machine, outcome).unwrap());
    assert_eq!(machine.status(), ChatStatus::SubtitleSelected);
    assert_eq!(machine.generation(), generation);
}

#[tokio::test]
async fn init_failure_can_be_retried() {
    let mut s = session(transcript_t, FlakyFactory::new(1), SessionOptions::default());
    s.select_subtitle(english()).unwrap();
    settle(&mut s).await;

    match s.state() {
        ChatState::ChatInitFailed { error, .. } => assert!(error.contains("service unavailable")),
        other => panic!("unexpected state {}", other.status()),
    }
    assert!(!s.machine().can_process_messages());

    s.retry().unwrap();
    assert_eq!(s.status(), ChatStatus::ChatInitializing);
    settle(&mut s).await;
    assert_eq!(s.status(), ChatStatus::ChatActive);
}

#[tokio::test]
async fn without_auto_transition_chat_waits_in_ready() {
    let mut s = session(
        transcript_t,
        FlakyFactory::new(0),
        SessionOptions {
            auto_transition: false,
        },
    );
    s.select_subtitle(english()).unwrap();
    settle(&mut s).await;

    assert_eq!(s.status(), ChatStatus::ChatReady);
    assert!(s.machine().can_process_messages());
}

#[tokio::test]
async fn streamed_reply_then_clear() {
    let mut s = session(transcript_t, FlakyFactory::new(0), SessionOptions::default());
    s.select_subtitle(english()).unwrap();
    settle(&mut s).await;

    s.submit("What is this about?").unwrap();
    settle(&mut s).await;

    let log = s.messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].content, "Hello!");
    assert_eq!(log[1].streaming_complete, Some(true));
    assert!(!s.is_busy());

    s.submit("/clear").unwrap();
    settle(&mut s).await;
    assert!(s.messages().is_empty());
    // Auto-transition puts an emptied chat straight back to active.
    assert_eq!(s.status(), ChatStatus::ChatActive);
}

#[tokio::test]
async fn stream_failure_replaces_partial_reply() {
    let mut factory = FlakyFactory::new(0);
    factory.fail_after = Some(1);
    let mut s = session(transcript_t, factory, SessionOptions::default());
    s.select_subtitle(english()).unwrap();
    settle(&mut s).await;

    s.submit("hi").unwrap();
    settle(&mut s).await;

    let log = s.messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "hi");
    assert_eq!(log[1].content, STREAM_ERROR_REPLY);
    assert!(!log[1].is_streaming());
    assert_eq!(s.status(), ChatStatus::ChatActive);
}
