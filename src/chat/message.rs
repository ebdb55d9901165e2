//! Chat log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// `Some(false)` while an assistant reply is still streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_complete: Option<bool>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let timestamp = Utc::now();
        Self {
            id: next_message_id(role, &timestamp),
            role,
            content: content.into(),
            timestamp,
            streaming_complete: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Empty assistant message that chunks are appended to.
    pub fn placeholder() -> Self {
        Self {
            streaming_complete: Some(false),
            ..Self::assistant("")
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_complete == Some(false)
    }
}

/// `msg-<unix-millis>-<seq>-<role>`; the sequence keeps ids unique within a
/// millisecond.
fn next_message_id(role: Role, timestamp: &DateTime<Utc>) -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("msg-{}-{}-{}", timestamp.timestamp_millis(), seq, role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_unique_and_tagged() {
        let ids: HashSet<String> = (0..100).map(|_| ChatMessage::user("x").id).collect();
        assert_eq!(ids.len(), 100);

        let msg = ChatMessage::assistant("hello");
        assert!(msg.id.starts_with("msg-"));
        assert!(msg.id.ends_with("-assistant"));
    }

    #[test]
    fn test_placeholder() {
        let msg = ChatMessage::placeholder();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_empty());
        assert!(msg.is_streaming());
        assert!(!ChatMessage::user("hi").is_streaming());
    }
}
