// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Flat prompt rendering for the text-generation endpoint
//!
//! System content is written verbatim on its own line, user turns as
//! `Human: ...` and assistant turns as `Assistant: ...`. The prompt always
//! ends on an assistant line so the model continues as the assistant.

use crate::llm::message::{Message, Role};

pub const HUMAN_PREFIX: &str = "Human:";
pub const ASSISTANT_PREFIX: &str = "Assistant:";

/// Render messages into the flat prompt string.
///
/// Content is trimmed; messages whose trimmed content is empty are omitted.
pub fn format_prompt(messages: &[Message]) -> String {
    let mut lines: Vec<String> = messages
        .iter()
        .filter_map(|message| {
            let text = message.text();
            let content = text.trim();
            if content.is_empty() {
                return None;
            }
            Some(match message.role {
                Role::System => content.to_string(),
                Role::User => format!("{HUMAN_PREFIX} {content}"),
                Role::Assistant => format!("{ASSISTANT_PREFIX} {content}"),
            })
        })
        .collect();

    let ends_with_assistant = lines
        .last()
        .is_some_and(|line| line.starts_with(ASSISTANT_PREFIX));
    if !ends_with_assistant {
        lines.push(ASSISTANT_PREFIX.to_string());
    }

    lines.join("\n")
}
