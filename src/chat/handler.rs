//! Turns one submitted input into a sequence of chat log snapshots.
//!
//! Commands resolve locally in a single update. Plain text goes to the
//! conversation backend and the reply grows one chunk per update.

use super::clipboard::{Clipboard, SystemClipboard};
use super::commands::{help_text, parse_command, ChatCommand};
use super::message::{ChatMessage, Role};
use crate::backend::ConversationBackend;
use chrono::Local;
use futures::StreamExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Shown in place of a reply whose stream failed.
pub const STREAM_ERROR_REPLY: &str =
    "Sorry, I encountered an error processing your message. Please try again.";

const DEFAULT_EXIT_DELAY: Duration = Duration::from_millis(1000);

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("Invalid regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("Invalid regex"));

/// Called once the farewell has been shown.
pub type ExitHandler = Arc<dyn Fn() + Send + Sync>;

/// Runs a callback after a delay.
pub trait TimeoutHandler: Send + Sync {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>);
}

/// Delays on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimeout;

impl TimeoutHandler for TokioTimeout {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}

/// The streaming message pipeline.
pub struct MessageHandler {
    clipboard: Arc<dyn Clipboard>,
    exit_handler: ExitHandler,
    timeout: Arc<dyn TimeoutHandler>,
    exit_delay: Duration,
    save_dir: PathBuf,
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHandler {
    /// Handler using the system clipboard, real process exit and the
    /// current directory for saved chats.
    pub fn new() -> Self {
        Self {
            clipboard: Arc::new(SystemClipboard::new()),
            exit_handler: Arc::new(|| std::process::exit(0)),
            timeout: Arc::new(TokioTimeout),
            exit_delay: DEFAULT_EXIT_DELAY,
            save_dir: PathBuf::from("."),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_exit_handler(mut self, exit_handler: ExitHandler) -> Self {
        self.exit_handler = exit_handler;
        self
    }

    pub fn with_timeout_handler(mut self, timeout: Arc<dyn TimeoutHandler>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_exit_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = delay;
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Process one input.
    ///
    /// Every `on_log_update` call carries the complete log and replaces the
    /// previous one. `on_busy_update` is only used for plain chat, and a
    /// `true` is always followed by a `false`.
    #[instrument(skip_all, fields(len = input.len()))]
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_message<L, B>(
        &self,
        input: &str,
        backend: &dyn ConversationBackend,
        transcript: &str,
        video_name: &str,
        current_log: &[ChatMessage],
        mut on_log_update: L,
        mut on_busy_update: B,
    ) where
        L: FnMut(Vec<ChatMessage>) + Send,
        B: FnMut(bool) + Send,
    {
        if let Some(command) = parse_command(input) {
            self.handle_command(input, command, transcript, video_name, current_log, on_log_update);
            return;
        }

        on_busy_update(true);

        let mut log = current_log.to_vec();
        log.push(ChatMessage::user(input));
        on_log_update(log.clone());

        let without_reply = log.len();
        log.push(ChatMessage::placeholder());
        on_log_update(log.clone());

        match stream_reply(backend, input, &mut log, &mut on_log_update).await {
            Ok(chunks) => {
                debug!("Reply complete after {} chunks", chunks);
                if let Some(reply) = log.last_mut() {
                    reply.streaming_complete = Some(true);
                }
                on_log_update(log);
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                log.truncate(without_reply);
                log.push(ChatMessage {
                    streaming_complete: Some(true),
                    ..ChatMessage::assistant(STREAM_ERROR_REPLY)
                });
                on_log_update(log);
            }
        }

        on_busy_update(false);
    }

    fn handle_command<L>(
        &self,
        input: &str,
        command: ChatCommand,
        transcript: &str,
        video_name: &str,
        current_log: &[ChatMessage],
        mut on_log_update: L,
    ) where
        L: FnMut(Vec<ChatMessage>),
    {
        info!("Running command {}", command.name());

        let reply = match &command {
            ChatCommand::Clear => {
                on_log_update(Vec::new());
                return;
            }
            ChatCommand::Help => help_text(),
            ChatCommand::Transcript => format!("Full Video Transcript:\n\n{}", transcript),
            ChatCommand::CopyLast => self.copy_last(current_log),
            ChatCommand::CopyAll => self.copy_all(current_log),
            ChatCommand::SaveToFile => self.save_to_file(current_log, video_name),
            ChatCommand::Exit => "Goodbye! 👋".to_string(),
            ChatCommand::Unknown(raw) => format!(
                "Unknown command: {}. Type /help for available commands.",
                raw
            ),
        };

        let mut log = current_log.to_vec();
        log.push(ChatMessage::user(input));
        log.push(ChatMessage {
            streaming_complete: Some(true),
            ..ChatMessage::assistant(reply)
        });
        on_log_update(log);

        if command == ChatCommand::Exit {
            let exit = Arc::clone(&self.exit_handler);
            self.timeout.schedule(self.exit_delay, Box::new(move || exit()));
        }
    }

    fn copy_last(&self, log: &[ChatMessage]) -> String {
        let Some(last) = log.iter().rev().find(|m| m.role == Role::Assistant) else {
            return "No assistant message found to copy.".to_string();
        };

        match self.clipboard.copy(&last.content) {
            Ok(()) => "Last assistant message copied to clipboard! ✓".to_string(),
            Err(e) => {
                error!("Error copying to clipboard: {}", e);
                "Failed to copy message to clipboard. Please try again.".to_string()
            }
        }
    }

    fn copy_all(&self, log: &[ChatMessage]) -> String {
        if log.is_empty() {
            return "No messages found to copy.".to_string();
        }

        match self.clipboard.copy(&format_plain(log)) {
            Ok(()) => "Full chat history copied to clipboard! ✓".to_string(),
            Err(e) => {
                error!("Error copying to clipboard: {}", e);
                "Failed to copy chat history to clipboard. Please try again.".to_string()
            }
        }
    }

    fn save_to_file(&self, log: &[ChatMessage], video_name: &str) -> String {
        if log.is_empty() {
            return "No messages found to save.".to_string();
        }

        let filename = chat_filename(video_name);
        let path = self.save_dir.join(&filename);
        match write_markdown(&path, log, video_name) {
            Ok(()) => {
                info!("Saved chat to {:?}", path);
                format!("Chat history saved to {} ✓", filename)
            }
            Err(e) => {
                error!("Error saving chat to file: {}", e);
                "Failed to save chat history to file. Please try again.".to_string()
            }
        }
    }
}

/// Feed backend chunks into the last message of `log`.
async fn stream_reply<L>(
    backend: &dyn ConversationBackend,
    input: &str,
    log: &mut [ChatMessage],
    on_log_update: &mut L,
) -> crate::error::Result<usize>
where
    L: FnMut(Vec<ChatMessage>) + Send,
{
    let mut stream = backend.send_message(input).await?;
    let mut chunks = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(reply) = log.last_mut() {
            reply.content.push_str(&chunk);
        }
        chunks += 1;
        on_log_update(log.to_vec());
    }

    Ok(chunks)
}

/// `role\ncontent` blocks separated by two blank lines.
pub fn format_plain(log: &[ChatMessage]) -> String {
    log.iter()
        .map(|m| format!("{}\n{}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n\n")
}

/// Titled markdown rendering of the log.
pub fn format_markdown(log: &[ChatMessage], video_name: &str) -> String {
    let title = if video_name.trim().is_empty() {
        "Chat with Video".to_string()
    } else {
        format!("Chat with Video: {}", video_name)
    };

    let mut markdown = format!("# {}\n\n", title);
    markdown.push_str(&format!(
        "*Generated on: {}*\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    markdown.push_str("---\n\n");

    for message in log {
        let header = match message.role {
            Role::User => "## User",
            Role::Assistant => "## Assistant",
        };
        markdown.push_str(&format!("{}\n\n{}\n\n", header, message.content));
    }

    markdown
}

/// Filesystem-safe, lowercase file stem for a video name.
pub fn sanitize_filename(name: &str) -> String {
    let name = UNSAFE_FILENAME_CHARS.replace_all(name, "-");
    let name = WHITESPACE_RUN.replace_all(&name, "-");
    let name = DASH_RUN.replace_all(&name, "-");
    name.trim_matches('-').to_lowercase()
}

/// `<sanitized-name>.chat.md`, falling back to `unknown-video`.
pub fn chat_filename(video_name: &str) -> String {
    let stem = match sanitize_filename(video_name) {
        s if s.is_empty() => "unknown-video".to_string(),
        s => s,
    };
    format!("{}.chat.md", stem)
}

fn write_markdown(path: &Path, log: &[ChatMessage], video_name: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format_markdown(log, video_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextStream;
    use crate::error::{Result, VidchatError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend replaying a fixed script of chunks.
    struct ScriptedBackend {
        chunks: Vec<Result<String>>,
        fail_open: bool,
    }

    impl ScriptedBackend {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok(c.to_string())).collect(),
                fail_open: false,
            }
        }
    }

    #[async_trait]
    impl ConversationBackend for ScriptedBackend {
        fn system_prompt(&self) -> String {
            String::new()
        }

        async fn send_message(&self, _message: &str) -> Result<TextStream> {
            if self.fail_open {
                return Err(VidchatError::Provider("unreachable".into()));
            }
            let chunks: Vec<Result<String>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(VidchatError::Provider(e.to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    #[derive(Default)]
    struct RecordingClipboard {
        copied: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Clipboard for RecordingClipboard {
        fn copy(&self, text: &str) -> Result<()> {
            if self.fail {
                return Err(VidchatError::Clipboard("no display".into()));
            }
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTimeout {
        scheduled: Mutex<Vec<(Duration, Box<dyn FnOnce() + Send>)>>,
    }

    impl TimeoutHandler for RecordingTimeout {
        fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
            self.scheduled.lock().unwrap().push((delay, callback));
        }
    }

    #[derive(Default)]
    struct Recorded {
        logs: Vec<Vec<ChatMessage>>,
        busy: Vec<bool>,
    }

    async fn run(
        handler: &MessageHandler,
        input: &str,
        backend: &dyn ConversationBackend,
        log: &[ChatMessage],
    ) -> Recorded {
        let logs = Mutex::new(Vec::new());
        let busy = Mutex::new(Vec::new());
        handler
            .handle_message(
                input,
                backend,
                "the transcript",
                "My Video",
                log,
                |l| logs.lock().unwrap().push(l),
                |b| busy.lock().unwrap().push(b),
            )
            .await;
        Recorded {
            logs: logs.into_inner().unwrap(),
            busy: busy.into_inner().unwrap(),
        }
    }

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("first"),
            ChatMessage::user("hi2"),
            ChatMessage::assistant("second"),
        ]
    }

    fn test_handler(clipboard: Arc<RecordingClipboard>) -> MessageHandler {
        MessageHandler::new()
            .with_clipboard(clipboard)
            .with_timeout_handler(Arc::new(RecordingTimeout::default()))
            .with_exit_handler(Arc::new(|| panic!("exit must not run in tests")))
    }

    #[tokio::test]
    async fn test_clear_emits_single_empty_update() {
        let handler = test_handler(Arc::default());
        let backend = ScriptedBackend::replying(&["unused"]);

        let rec = run(&handler, "/clear", &backend, &conversation()).await;

        assert_eq!(rec.logs, vec![Vec::<ChatMessage>::new()]);
        assert!(rec.busy.is_empty());
    }

    #[tokio::test]
    async fn test_streams_chunks_into_one_message() {
        let handler = test_handler(Arc::default());
        let backend = ScriptedBackend::replying(&["a", "b", "c"]);

        let rec = run(&handler, "hello", &backend, &[]).await;

        assert_eq!(rec.busy, vec![true, false]);
        // user, placeholder, three chunks, completion
        assert_eq!(rec.logs.len(), 6);

        let contents: Vec<&str> = rec.logs[1..5]
            .iter()
            .map(|l| l[1].content.as_str())
            .collect();
        assert_eq!(contents, vec!["", "a", "ab", "abc"]);

        let last = rec.logs.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content, "hello");
        assert_eq!(last[0].role, Role::User);
        assert_eq!(last[1].content, "abc");
        assert_eq!(last[1].streaming_complete, Some(true));

        let placeholder_id = &rec.logs[1][1].id;
        assert!(rec.logs[1..].iter().all(|l| &l[1].id == placeholder_id));
        assert_eq!(rec.logs[1][1].streaming_complete, Some(false));
    }

    #[tokio::test]
    async fn test_stream_error_replaces_partial_reply() {
        let handler = test_handler(Arc::default());
        let backend = ScriptedBackend {
            chunks: vec![
                Ok("partial".to_string()),
                Err(VidchatError::Provider("reset".into())),
            ],
            fail_open: false,
        };

        let rec = run(&handler, "hello", &backend, &conversation()).await;

        assert_eq!(rec.busy, vec![true, false]);
        let last = rec.logs.last().unwrap();
        assert_eq!(last.len(), 6);
        assert_eq!(last[5].content, STREAM_ERROR_REPLY);
        assert_eq!(last[5].streaming_complete, Some(true));
        assert!(last.iter().all(|m| m.content != "partial"));
    }

    #[tokio::test]
    async fn test_open_error_still_clears_busy() {
        let handler = test_handler(Arc::default());
        let backend = ScriptedBackend {
            chunks: Vec::new(),
            fail_open: true,
        };

        let rec = run(&handler, "hello", &backend, &[]).await;

        assert_eq!(rec.busy, vec![true, false]);
        let last = rec.logs.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].content, STREAM_ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_copy_last_takes_latest_assistant() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let handler = test_handler(Arc::clone(&clipboard));
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/copy-last", &backend, &conversation()).await;

        assert_eq!(*clipboard.copied.lock().unwrap(), vec!["second".to_string()]);
        assert!(rec.busy.is_empty());
        assert_eq!(rec.logs.len(), 1);
        let log = &rec.logs[0];
        assert_eq!(log.len(), 6);
        assert_eq!(log[4].content, "/copy-last");
        assert_eq!(log[5].content, "Last assistant message copied to clipboard! ✓");
    }

    #[tokio::test]
    async fn test_copy_commands_with_nothing_to_copy() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let handler = test_handler(Arc::clone(&clipboard));
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/copy-last", &backend, &[ChatMessage::user("q")]).await;
        assert_eq!(rec.logs[0][2].content, "No assistant message found to copy.");

        let rec = run(&handler, "/copy-all", &backend, &[]).await;
        assert_eq!(rec.logs[0][1].content, "No messages found to copy.");
        assert!(clipboard.copied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_all_format() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let handler = test_handler(Arc::clone(&clipboard));
        let backend = ScriptedBackend::replying(&[]);

        run(&handler, "/copy-all", &backend, &conversation()).await;

        assert_eq!(
            clipboard.copied.lock().unwrap()[0],
            "user\nhi\n\n\nassistant\nfirst\n\n\nuser\nhi2\n\n\nassistant\nsecond"
        );
    }

    #[tokio::test]
    async fn test_clipboard_failure_becomes_reply() {
        let clipboard = Arc::new(RecordingClipboard {
            fail: true,
            ..Default::default()
        });
        let handler = test_handler(clipboard);
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/copy-all", &backend, &conversation()).await;
        assert_eq!(
            rec.logs[0].last().unwrap().content,
            "Failed to copy chat history to clipboard. Please try again."
        );
    }

    #[tokio::test]
    async fn test_unknown_and_transcript_commands() {
        let handler = test_handler(Arc::default());
        let backend = ScriptedBackend::replying(&["never"]);

        let rec = run(&handler, "/nope", &backend, &[]).await;
        assert!(rec.busy.is_empty());
        assert_eq!(
            rec.logs[0][1].content,
            "Unknown command: /nope. Type /help for available commands."
        );

        let rec = run(&handler, "/transcript", &backend, &[]).await;
        assert_eq!(rec.logs[0][1].content, "Full Video Transcript:\n\nthe transcript");
        assert_eq!(rec.logs[0][1].streaming_complete, Some(true));
    }

    #[tokio::test]
    async fn test_exit_schedules_handler_after_delay() {
        let timeout = Arc::new(RecordingTimeout::default());
        let exits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&exits);
        let handler = MessageHandler::new()
            .with_clipboard(Arc::new(RecordingClipboard::default()))
            .with_timeout_handler(Arc::clone(&timeout) as Arc<dyn TimeoutHandler>)
            .with_exit_handler(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/exit", &backend, &[]).await;
        assert_eq!(rec.logs[0][1].content, "Goodbye! 👋");
        assert_eq!(exits.load(Ordering::SeqCst), 0);

        let (delay, callback) = timeout.scheduled.lock().unwrap().pop().unwrap();
        assert_eq!(delay, Duration::from_millis(1000));
        callback();
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_save_to_file_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let handler = test_handler(Arc::default()).with_save_dir(dir.path());
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/save-to-file", &backend, &conversation()).await;
        assert_eq!(
            rec.logs[0].last().unwrap().content,
            "Chat history saved to my-video.chat.md ✓"
        );

        let saved = std::fs::read_to_string(dir.path().join("my-video.chat.md")).unwrap();
        assert!(saved.starts_with("# Chat with Video: My Video\n\n*Generated on: "));
        assert!(saved.contains("---\n\n## User\n\nhi\n\n## Assistant\n\nfirst\n\n"));
        assert!(saved.ends_with("## Assistant\n\nsecond\n\n"));
    }

    #[tokio::test]
    async fn test_save_with_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let handler = test_handler(Arc::default()).with_save_dir(dir.path());
        let backend = ScriptedBackend::replying(&[]);

        let rec = run(&handler, "/save-to-file", &backend, &[]).await;
        assert_eq!(rec.logs[0][1].content, "No messages found to save.");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Video"), "my-video");
        assert_eq!(sanitize_filename("  A/B: c?  "), "a-b-c");
        assert_eq!(sanitize_filename("a<>b"), "a-b");
        assert_eq!(sanitize_filename("--x--"), "x");
        assert_eq!(chat_filename(""), "unknown-video.chat.md");
        assert_eq!(chat_filename("???"), "unknown-video.chat.md");
    }
}
