//! Conversation core: command grammar, streaming pipeline, lifecycle and
//! the effects that drive it.

pub mod clipboard;
pub mod commands;
pub mod composition;
pub mod effects;
pub mod handler;
pub mod lifecycle;
pub mod message;
pub mod session;

pub use clipboard::{Clipboard, SystemClipboard};
pub use commands::{
    command_suggestions, help_text, is_command, parse_command, ChatCommand, CommandSuggestion,
};
pub use composition::{MessageStore, SendRefusal};
pub use effects::{ChatServiceInitEffect, EffectOutcome, SubtitleDownloadEffect};
pub use handler::{ExitHandler, MessageHandler, TimeoutHandler, TokioTimeout};
pub use lifecycle::{is_valid_transition, ChatState, ChatStateMachine, ChatStatus};
pub use message::{ChatMessage, Role};
pub use session::{ChatSession, SessionEvent, SessionOptions};
