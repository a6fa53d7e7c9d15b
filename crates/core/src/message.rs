use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat speaker role.
///
/// The widget only ever appends `User` and `Assistant` messages. `System` exists because the
/// server may hand back a history that starts with its own instruction message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label shown above a bubble in the log.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

/// One entry of the conversation as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered history owned by the session controller.
///
/// Local edits are append-only; a server reply may swap the whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replaces the history verbatim with the server's copy.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// How assistant replies are pre-formatted before markdown interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    #[default]
    Plain,
    Bullets,
    Numbered,
}

impl FormatStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStyle::Plain => "plain",
            FormatStyle::Bullets => "bullets",
            FormatStyle::Numbered => "numbered",
        }
    }

    /// Parses a selector value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "plain" => Some(FormatStyle::Plain),
            "bullets" => Some(FormatStyle::Bullets),
            "numbered" => Some(FormatStyle::Numbered),
            _ => None,
        }
    }

    /// Like [`FormatStyle::parse`], but anything unrecognised means plain.
    pub fn parse_lossy(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }

    pub fn all() -> [FormatStyle; 3] {
        [FormatStyle::Plain, FormatStyle::Bullets, FormatStyle::Numbered]
    }
}

impl fmt::Display for FormatStyle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
