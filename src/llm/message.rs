// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! Defines the message structures exchanged in a chat and the ordered
//! conversation log each session owns.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Result, TallyError};

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Content of the message
    pub content: MessageContent,

    /// When the message was created (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt
    System,
}

/// Content of a message
///
/// Payloads coming from the UI may carry a plain string, a list of parts,
/// or an object with a `text` field. The last form is folded into
/// `Text` when deserializing.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multiple content parts
    Parts(Vec<ContentPart>),
}

/// A part within a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },
    /// Image reference, ignored when building prompts
    ImageUrl { image_url: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Object { text: String },
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawContent::deserialize(deserializer)? {
            RawContent::Text(text) | RawContent::Object { text } => MessageContent::Text(text),
            RawContent::Parts(parts) => MessageContent::Parts(parts),
        })
    }
}

impl Message {
    /// Create a message with an explicit role, stamped now
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Replace the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Get the text content of the message
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Whether this is a system message
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Local wall-clock time the message was created, e.g. `14:05`
    pub fn display_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// Epoch milliseconds of the timestamp
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

impl MessageContent {
    /// Extract the textual content. Parts are joined with newlines and
    /// non-text parts are skipped.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// Ordered conversation log owned by one chat session.
///
/// System messages stay in the log next to the turns; at most one of them
/// is present outside of `set_system_prompt`.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation seeded with a system prompt
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.set_system_prompt(system_prompt);
        conversation
    }

    /// Append a message to the end of the log
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Every message in insertion order, system messages included
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Non-system messages in insertion order
    pub fn turns(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }

    /// Number of non-system messages
    pub fn len(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }

    /// Whether there are no non-system messages
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current system prompt text, if one is set
    pub fn system_prompt(&self) -> Option<String> {
        self.messages.iter().find(|m| m.is_system()).map(Message::text)
    }

    /// Remove every non-system message
    pub fn clear(&mut self) {
        self.messages.retain(Message::is_system);
    }

    /// Replace the system prompt. Empty text removes it.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.messages.retain(|m| !m.is_system());
        if !text.trim().is_empty() {
            self.messages.insert(0, Message::system(text));
        }
    }

    /// Replace the non-system history with `imported`, keeping system messages.
    ///
    /// The whole batch is validated before anything is changed. Returns the
    /// number of messages imported.
    pub fn import(&mut self, imported: Vec<Message>) -> Result<usize> {
        if let Some(pos) = imported.iter().position(Message::is_system) {
            return Err(TallyError::Import(format!(
                "entry {pos} has role 'system'; set the system prompt instead"
            )));
        }

        let count = imported.len();
        self.clear();
        self.messages.extend(imported);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert!(matches!(msg.content, MessageContent::Text(ref s) if s == "Hello"));
    }

    #[test]
    fn test_message_system() {
        let msg = Message::system("You are a budgeting assistant");
        assert!(msg.is_system());
    }

    #[test]
    fn test_content_parts_text_joins_text_only() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "line one".to_string(),
            },
            ContentPart::ImageUrl {
                image_url: "https://example.com/receipt.png".to_string(),
            },
            ContentPart::Text {
                text: "line two".to_string(),
            },
        ]);
        assert_eq!(content.text(), "line one\nline two");
    }

    #[test]
    fn test_content_deserialize_plain_string() {
        let content: MessageContent = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(content, MessageContent::Text("hi".to_string()));
    }

    #[test]
    fn test_content_deserialize_object_with_text() {
        let content: MessageContent = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(content, MessageContent::Text("hi".to_string()));
    }

    #[test]
    fn test_content_deserialize_parts() {
        let content: MessageContent =
            serde_json::from_str(r#"[{"type":"text","text":"a"},{"type":"text","text":"b"}]"#)
                .unwrap();
        assert_eq!(content.text(), "a\nb");
    }

    #[test]
    fn test_content_deserialize_rejects_number() {
        assert!(serde_json::from_str::<MessageContent>("42").is_err());
    }

    #[test]
    fn test_message_serializes_timestamp_as_millis() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let msg = Message::user("x").with_timestamp(ts);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(value["role"], "user");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_conversation_len_excludes_system() {
        let mut conversation = Conversation::with_system("S");
        conversation.push(Message::user("a"));
        conversation.push(Message::assistant("b"));

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn test_conversation_clear_preserves_system() {
        let mut conversation = Conversation::with_system("S");
        conversation.push(Message::user("a"));
        conversation.clear();
        conversation.clear();

        assert!(conversation.is_empty());
        assert_eq!(conversation.system_prompt().as_deref(), Some("S"));
    }

    #[test]
    fn test_set_system_prompt_replaces_and_moves_to_head() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("a"));
        conversation.set_system_prompt("first");
        conversation.set_system_prompt("second");

        let systems: Vec<_> = conversation
            .messages()
            .iter()
            .filter(|m| m.is_system())
            .collect();
        assert_eq!(systems.len(), 1);
        assert!(conversation.messages()[0].is_system());
        assert_eq!(conversation.system_prompt().as_deref(), Some("second"));
    }

    #[test]
    fn test_set_system_prompt_empty_removes() {
        let mut conversation = Conversation::with_system("S");
        conversation.set_system_prompt("  ");
        assert!(conversation.system_prompt().is_none());
    }

    #[test]
    fn test_turns_skip_system_and_keep_order() {
        let mut conversation = Conversation::with_system("S");
        conversation.push(Message::user("a"));
        conversation.push(Message::assistant("b"));

        let turns: Vec<_> = conversation.turns().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].text(), "b");
    }

    #[test]
    fn test_import_replaces_tail_and_keeps_system() {
        let mut conversation = Conversation::with_system("S");
        conversation.push(Message::user("old"));

        let count = conversation
            .import(vec![
                Message::user("new question"),
                Message::assistant("new answer"),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.system_prompt().as_deref(), Some("S"));
        assert_eq!(conversation.turns().next().unwrap().text(), "new question");
    }

    #[test]
    fn test_import_rejects_system_without_changes() {
        let mut conversation = Conversation::with_system("S");
        conversation.push(Message::user("keep me"));

        let err = conversation
            .import(vec![Message::user("fine"), Message::system("sneaky")])
            .unwrap_err();

        assert!(matches!(err, TallyError::Import(_)));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.turns().next().unwrap().text(), "keep me");
    }
}
