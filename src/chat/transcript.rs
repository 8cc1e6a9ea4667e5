// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation import and export
//!
//! Exports carry the conversation without system messages plus a redacted
//! copy of the session configuration. Imports accept either a bare array of
//! messages or a whole export object.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::config::ExportedConfig;
use crate::error::{Result, TallyError};
use crate::llm::message::{Message, MessageContent, Role};

/// A non-system message as shown to the person chatting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: MessageContent,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Local clock time, e.g. `14:05`
    #[serde(default)]
    pub time: String,
}

impl From<&Message> for ConversationEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            timestamp: message.timestamp_millis(),
            time: message.display_time(),
        }
    }
}

/// One message in an import payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportMessage {
    pub role: Role,
    pub content: MessageContent,
    /// Epoch milliseconds; "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ImportMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            timestamp: None,
        }
    }

    /// Convert into a stored message, stamping `now` when no valid timestamp was given
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        let timestamp = self
            .timestamp
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(now);
        Message::new(self.role, self.content).with_timestamp(timestamp)
    }
}

impl From<ConversationEntry> for ImportMessage {
    fn from(entry: ConversationEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.content,
            timestamp: Some(entry.timestamp),
        }
    }
}

/// Snapshot produced by `ChatSession::export_conversation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationExport {
    pub config: ExportedConfig,
    pub messages: Vec<ConversationEntry>,
    /// Epoch milliseconds
    pub export_timestamp: i64,
}

impl ConversationExport {
    /// Messages in a form that can be fed back into an import
    pub fn import_messages(&self) -> Vec<ImportMessage> {
        self.messages.iter().cloned().map(ImportMessage::from).collect()
    }

    /// Write as pretty JSON
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Parse an import payload.
///
/// Accepts `[ {role, content, timestamp?}, ... ]` or an object with a
/// `messages` array. Anything else is an import error.
pub fn parse_import(payload: &Value) -> Result<Vec<ImportMessage>> {
    let list = match payload {
        Value::Array(_) => payload,
        Value::Object(map) => map.get("messages").ok_or_else(|| {
            TallyError::Import("expected a message list or an object with 'messages'".to_string())
        })?,
        _ => {
            return Err(TallyError::Import(
                "expected a message list or an object with 'messages'".to_string(),
            ))
        }
    };

    let Value::Array(items) = list else {
        return Err(TallyError::Import("'messages' is not a list".to_string()));
    };

    items
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            ImportMessage::deserialize(item)
                .map_err(|e| TallyError::Import(format!("entry {pos} is malformed: {e}")))
        })
        .collect()
}

/// Read and parse an import payload from a JSON file
pub fn load_import(path: &Path) -> Result<Vec<ImportMessage>> {
    let content = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&content)
        .map_err(|e| TallyError::Import(format!("{} is not valid JSON: {e}", path.display())))?;
    parse_import(&payload)
}
