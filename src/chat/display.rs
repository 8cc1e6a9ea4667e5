// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Display formatting for the chat interface
//!
//! Functions return formatted strings rather than writing directly to
//! stdout, making them easy to test.

use crate::chat::session::{ChatResult, Usage};
use crate::chat::transcript::ConversationEntry;
use crate::llm::message::Role;

pub const ASSISTANT_LABEL: &str = "Tally";
pub const USER_LABEL: &str = "You";

/// Label shown in front of a message
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => USER_LABEL,
        Role::Assistant => ASSISTANT_LABEL,
        Role::System => "System",
    }
}

/// Truncate a string to at most `max_len` characters, ending in `...`
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// One history line: `[14:05] You: text`
pub fn format_entry(entry: &ConversationEntry, max_len: usize) -> String {
    let text = entry.content.text().replace('\n', " ");
    format!(
        "[{}] {}: {}",
        entry.time,
        role_label(entry.role),
        truncate_string(text.trim(), max_len)
    )
}

/// Full history listing, or a placeholder when empty
pub fn format_history(entries: &[ConversationEntry], max_len: usize) -> String {
    if entries.is_empty() {
        return "(no messages yet)".to_string();
    }
    entries
        .iter()
        .map(|e| format_entry(e, max_len))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_usage(usage: &Usage) -> String {
    format!(
        "{} tokens ({} in, {} out)",
        usage.total_tokens, usage.input_tokens, usage.output_tokens
    )
}

/// Status line printed after a send
pub fn format_result_footer(result: &ChatResult) -> String {
    match (&result.usage, result.conversation_length) {
        (Some(usage), Some(len)) => format!("{} | {len} messages", format_usage(usage)),
        (Some(usage), None) => format_usage(usage),
        (None, Some(len)) => format!("{len} messages"),
        (None, None) => String::new(),
    }
}
