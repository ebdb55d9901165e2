//! Slash-command grammar for the chat input.
//!
//! Commands are matched exactly and case-sensitively. Suggestions use a
//! case-insensitive prefix match and keep registration order.

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Exit,
    Transcript,
    Clear,
    CopyLast,
    CopyAll,
    SaveToFile,
    /// Slash text that names no registered command.
    Unknown(String),
}

/// Autocomplete entry for the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSuggestion {
    pub command: &'static str,
    pub description: &'static str,
}

struct RegisteredCommand {
    name: &'static str,
    description: &'static str,
    command: ChatCommand,
}

/// Registration order drives help output and suggestion order.
static REGISTERED: [RegisteredCommand; 7] = [
    RegisteredCommand {
        name: "/help",
        description: "Show this help message",
        command: ChatCommand::Help,
    },
    RegisteredCommand {
        name: "/exit",
        description: "Exit the chat and close the application",
        command: ChatCommand::Exit,
    },
    RegisteredCommand {
        name: "/transcript",
        description: "Show the full video transcript",
        command: ChatCommand::Transcript,
    },
    RegisteredCommand {
        name: "/clear",
        description: "Clear the message history",
        command: ChatCommand::Clear,
    },
    RegisteredCommand {
        name: "/copy-last",
        description: "Copy the last assistant message to clipboard",
        command: ChatCommand::CopyLast,
    },
    RegisteredCommand {
        name: "/copy-all",
        description: "Copy the full chat history to clipboard",
        command: ChatCommand::CopyAll,
    },
    RegisteredCommand {
        name: "/save-to-file",
        description: "Save the chat history to a markdown file",
        command: ChatCommand::SaveToFile,
    },
];

impl ChatCommand {
    /// The command's registered name, or the raw text for unknown commands.
    pub fn name(&self) -> &str {
        match self {
            ChatCommand::Unknown(raw) => raw,
            known => REGISTERED
                .iter()
                .find(|entry| entry.command == *known)
                .map(|entry| entry.name)
                .unwrap_or_default(),
        }
    }
}

/// Names of all registered commands, in registration order.
pub fn registered_commands() -> impl Iterator<Item = &'static str> {
    REGISTERED.iter().map(|entry| entry.name)
}

/// True iff `text` is exactly a registered command.
pub fn is_command(text: &str) -> bool {
    REGISTERED.iter().any(|entry| entry.name == text)
}

/// Parse chat input. `None` means plain conversational text.
pub fn parse_command(text: &str) -> Option<ChatCommand> {
    if !text.starts_with('/') {
        return None;
    }

    let command = REGISTERED
        .iter()
        .find(|entry| entry.name == text)
        .map(|entry| entry.command.clone())
        .unwrap_or_else(|| ChatCommand::Unknown(text.to_string()));
    Some(command)
}

/// Commands whose name starts with `partial`, ignoring case.
pub fn command_suggestions(partial: &str) -> Vec<CommandSuggestion> {
    if !partial.starts_with('/') || partial.chars().count() < 2 {
        return Vec::new();
    }

    let needle = partial.to_lowercase();
    REGISTERED
        .iter()
        .filter(|entry| entry.name.starts_with(&needle))
        .map(|entry| CommandSuggestion {
            command: entry.name,
            description: entry.description,
        })
        .collect()
}

/// Help reply listing every command.
pub fn help_text() -> String {
    let mut text = String::from("Available commands:\n\n");
    for entry in &REGISTERED {
        text.push_str(&format!("{} - {}\n", entry.name, entry.description));
    }
    text.push_str("\nType any other message to chat about the video.");
    text
}
