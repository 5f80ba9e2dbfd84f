//! Session, turn, and chat-mode domain types.
//!
//! These are the value objects that flow through the whole system:
//! a user message arrives for a session → a strategy answers it → the
//! exchange is appended to the session's turn history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Opaque identifier of a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used when history is rendered into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One stored message in a session's history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Render turns as `User: ...` / `Assistant: ...` lines for a prompt.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The conversational strategy a request is routed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// History-aware direct completion.
    #[default]
    Basic,
    /// Tool-using agent loop.
    Agentic,
    /// Retrieval-augmented answer over the document store.
    Rag,
    /// Text-to-SQL analytics.
    Analytics,
    /// Question answering over caller-supplied document text.
    Document,
}

impl ChatMode {
    pub const ALL: [ChatMode; 5] = [
        ChatMode::Basic,
        ChatMode::Agentic,
        ChatMode::Rag,
        ChatMode::Analytics,
        ChatMode::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Basic => "basic",
            ChatMode::Agentic => "agentic",
            ChatMode::Rag => "rag",
            ChatMode::Analytics => "analytics",
            ChatMode::Document => "document",
        }
    }

    /// Whether this strategy puts the session history into its prompt.
    pub fn uses_history(&self) -> bool {
        matches!(self, ChatMode::Basic | ChatMode::Agentic)
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatMode::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let supported: Vec<_> = ChatMode::ALL.iter().map(|m| m.as_str()).collect();
                format!(
                    "The chat mode {s} is not supported. Please use one of the following: {}",
                    supported.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello, assistant!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text, "Hello, assistant!");
    }

    #[test]
    fn history_renders_in_order() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello there")];
        assert_eq!(render_history(&turns), "User: hi\nAssistant: hello there");
    }

    #[test]
    fn empty_history_renders_empty() {
        assert_eq!(render_history(&[]), "");
    }

    #[test]
    fn chat_mode_parses_known_names() {
        assert_eq!("agentic".parse::<ChatMode>().unwrap(), ChatMode::Agentic);
        assert_eq!("rag".parse::<ChatMode>().unwrap(), ChatMode::Rag);
    }

    #[test]
    fn unknown_chat_mode_lists_supported() {
        let err = "poetry".parse::<ChatMode>().unwrap_err();
        assert!(err.contains("poetry"));
        assert!(err.contains("analytics"));
    }

    #[test]
    fn turn_serialization_uses_lowercase_role() {
        let json = serde_json::to_string(&Turn::assistant("ok")).unwrap();
        assert!(json.contains("\"assistant\""));
    }
}
