//! Non-visual orchestrator for one video's chat.
//!
//! The session owns the lifecycle, both effect coordinators, the message
//! store and the pipeline. Background work reports back as
//! [`SessionEvent`]s; the owner pulls them with [`ChatSession::next_event`]
//! and feeds them to [`ChatSession::apply`] on its own task, so all state
//! changes happen in one place.

use super::composition::{prepare_send, MessageStore, SendRefusal};
use super::effects::{commit, ChatServiceInitEffect, EffectOutcome, SubtitleDownloadEffect};
use super::handler::MessageHandler;
use super::lifecycle::{ChatState, ChatStateMachine, ChatStatus};
use super::message::ChatMessage;
use crate::backend::BackendFactory;
use crate::error::{Result, VidchatError};
use crate::subtitle::{SubtitleLanguage, SubtitleSource};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Something that happened off the session's task.
#[derive(Debug)]
pub enum SessionEvent {
    Effect(EffectOutcome),
    /// Full log snapshot from the pipeline.
    Log(Vec<ChatMessage>),
    Busy(bool),
    /// The pipeline finished with an input.
    SendFinished,
}

/// Session options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Move `chat-ready` to `chat-active` as soon as the log is empty.
    pub auto_transition: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_transition: true,
        }
    }
}

pub struct ChatSession {
    machine: ChatStateMachine,
    download: SubtitleDownloadEffect,
    init: ChatServiceInitEffect,
    store: MessageStore,
    handler: Arc<MessageHandler>,
    options: SessionOptions,
    tx: UnboundedSender<SessionEvent>,
    rx: UnboundedReceiver<SessionEvent>,
    /// Spawned tasks that have not reported back yet.
    pending: usize,
    sending: bool,
}

impl ChatSession {
    pub fn new(
        url: impl Into<String>,
        source: Arc<dyn SubtitleSource>,
        factory: Arc<dyn BackendFactory>,
        handler: MessageHandler,
        options: SessionOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            machine: ChatStateMachine::new(),
            download: SubtitleDownloadEffect::new(source, url),
            init: ChatServiceInitEffect::new(factory),
            store: MessageStore::new(),
            handler: Arc::new(handler),
            options,
            tx,
            rx,
            pending: 0,
            sending: false,
        }
    }

    pub fn state(&self) -> &ChatState {
        self.machine.state()
    }

    pub fn status(&self) -> ChatStatus {
        self.machine.status()
    }

    pub fn machine(&self) -> &ChatStateMachine {
        &self.machine
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    pub fn store_mut(&mut self) -> &mut MessageStore {
        &mut self.store
    }

    /// True while an input is being handled.
    pub fn is_busy(&self) -> bool {
        self.sending || self.store.is_streaming()
    }

    pub fn has_pending_work(&self) -> bool {
        self.pending > 0
    }

    /// Pick a subtitle track, from the start or after a failed download.
    pub fn select_subtitle(&mut self, subtitle: SubtitleLanguage) -> Result<()> {
        info!("Selected subtitle {} ({})", subtitle.name, subtitle.code);
        self.machine.transition_to_subtitle_selected(subtitle)?;
        self.drive()
    }

    /// Retry the step that failed: the download or the backend setup.
    pub fn retry(&mut self) -> Result<()> {
        match self.machine.state().clone() {
            ChatState::SubtitleDownloaded {
                selected_subtitle, ..
            } => self.machine.transition_to_subtitle_selected(selected_subtitle)?,
            ChatState::ChatInitFailed {
                transcript,
                video_name,
                ..
            } => self
                .machine
                .transition_to_chat_initializing(transcript, video_name)?,
            other => {
                return Err(VidchatError::InvalidInput(format!(
                    "Nothing to retry in state {}",
                    other.status()
                )))
            }
        }
        self.drive()
    }

    /// Hand an input to the pipeline. Returns why it was refused, if it was.
    pub fn submit(&mut self, input: &str) -> std::result::Result<(), SendRefusal> {
        let ctx = prepare_send(&self.machine, &self.store, self.sending, input)?;

        if let ChatState::ChatReady {
            transcript,
            video_name,
            backend,
        } = self.machine.state().clone()
        {
            if let Err(e) = self
                .machine
                .transition_to_chat_active(transcript, video_name, backend)
            {
                warn!("Could not activate chat: {}", e);
            }
        }

        self.sending = true;
        self.pending += 1;

        let handler = Arc::clone(&self.handler);
        let tx = self.tx.clone();
        let input = input.to_string();
        debug!("Submitting input ({} chars)", input.len());

        tokio::spawn(async move {
            let log_tx = tx.clone();
            let busy_tx = tx.clone();
            handler
                .handle_message(
                    &input,
                    ctx.backend.as_ref(),
                    &ctx.transcript,
                    &ctx.video_name,
                    &ctx.log,
                    move |messages| {
                        let _ = log_tx.send(SessionEvent::Log(messages));
                    },
                    move |busy| {
                        let _ = busy_tx.send(SessionEvent::Busy(busy));
                    },
                )
                .await;
            let _ = tx.send(SessionEvent::SendFinished);
        });

        Ok(())
    }

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Fold one event into the session state.
    pub fn apply(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Effect(outcome) => {
                self.pending = self.pending.saturating_sub(1);
                commit(&mut self.machine, outcome)?;
            }
            SessionEvent::Log(messages) => {
                let cleared = messages.is_empty();
                self.store.apply_log_update(messages);
                if cleared {
                    self.reset_conversation()?;
                }
            }
            SessionEvent::Busy(busy) => self.store.apply_busy_update(busy),
            SessionEvent::SendFinished => {
                self.pending = self.pending.saturating_sub(1);
                self.sending = false;
            }
        }
        self.drive()
    }

    /// Apply events until no spawned work is outstanding.
    pub async fn settle(&mut self) -> Result<()> {
        while self.pending > 0 {
            match self.next_event().await {
                Some(event) => self.apply(event)?,
                None => break,
            }
        }
        Ok(())
    }

    /// A cleared log puts an active chat back to ready.
    fn reset_conversation(&mut self) -> Result<()> {
        if let ChatState::ChatActive {
            transcript,
            video_name,
            backend,
        } = self.machine.state().clone()
        {
            self.machine
                .transition_to_chat_ready(transcript, video_name, backend)?;
        }
        Ok(())
    }

    /// Run auto-transition and let the effects look at the new state.
    fn drive(&mut self) -> Result<()> {
        if self.options.auto_transition && self.store.is_empty() {
            if let ChatState::ChatReady {
                transcript,
                video_name,
                backend,
            } = self.machine.state().clone()
            {
                self.machine
                    .transition_to_chat_active(transcript, video_name, backend)?;
            }
        }

        if self.download.observe(&self.machine, &self.tx) {
            self.pending += 1;
        }
        if self.init.observe(&self.machine, &self.tx) {
            self.pending += 1;
        }
        Ok(())
    }
}
