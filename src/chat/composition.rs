//! Live message log and the gate in front of the pipeline.

use super::lifecycle::ChatStateMachine;
use super::message::ChatMessage;
use crate::backend::ConversationBackend;
use std::sync::Arc;

/// Single source of truth for what the chat view shows.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    is_streaming: bool,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replace the log with a pipeline snapshot.
    pub fn apply_log_update(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn apply_busy_update(&mut self, busy: bool) {
        self.is_streaming = busy;
    }
}

/// Everything one pipeline run needs.
pub struct SendContext {
    pub transcript: String,
    pub video_name: String,
    pub backend: Arc<dyn ConversationBackend>,
    pub log: Vec<ChatMessage>,
}

/// Why an input was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRefusal {
    /// The lifecycle has no backend to talk to yet.
    NotReady,
    /// A previous input is still being handled.
    Busy,
    Empty,
}

/// Check that an input may go to the pipeline right now and collect what
/// it needs.
pub fn prepare_send(
    machine: &ChatStateMachine,
    store: &MessageStore,
    in_flight: bool,
    input: &str,
) -> Result<SendContext, SendRefusal> {
    if input.trim().is_empty() {
        return Err(SendRefusal::Empty);
    }
    if in_flight || store.is_streaming() {
        return Err(SendRefusal::Busy);
    }
    if !machine.can_process_messages() {
        return Err(SendRefusal::NotReady);
    }

    match (
        machine.current_transcript(),
        machine.current_video_name(),
        machine.current_backend(),
    ) {
        (Some(transcript), Some(video_name), Some(backend)) => Ok(SendContext {
            transcript: transcript.to_string(),
            video_name: video_name.to_string(),
            backend,
            log: store.messages().to_vec(),
        }),
        _ => Err(SendRefusal::NotReady),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;

    #[test]
    fn test_store_operations() {
        let mut store = MessageStore::new();
        assert!(store.is_empty());

        store.add_message(ChatMessage::user("one"));
        store.add_message(ChatMessage::assistant("two"));
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[1].role, Role::Assistant);

        store.apply_log_update(vec![ChatMessage::user("only")]);
        assert_eq!(store.messages().len(), 1);

        store.clear_messages();
        store.clear_messages();
        assert!(store.is_empty());

        store.apply_busy_update(true);
        assert!(store.is_streaming());
    }

    #[test]
    fn test_send_refused_before_ready() {
        let machine = ChatStateMachine::new();
        let store = MessageStore::new();
        assert_eq!(
            prepare_send(&machine, &store, false, "hello").err(),
            Some(SendRefusal::NotReady)
        );
        assert_eq!(
            prepare_send(&machine, &store, false, "   ").err(),
            Some(SendRefusal::Empty)
        );
    }

    #[test]
    fn test_send_refused_while_busy() {
        let machine = ChatStateMachine::new();
        let mut store = MessageStore::new();
        assert_eq!(
            prepare_send(&machine, &store, true, "hello").err(),
            Some(SendRefusal::Busy)
        );
        store.apply_busy_update(true);
        assert_eq!(
            prepare_send(&machine, &store, false, "hello").err(),
            Some(SendRefusal::Busy)
        );
    }
}
