// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Context window selection
//!
//! Bounds what is sent per request: every system message, then the most
//! recent `window_size` turns.

use crate::llm::message::Message;

/// Select the messages to send for the next request.
///
/// System messages come first regardless of where they sit in `history`,
/// followed by the last `window_size` non-system messages. Relative order is
/// preserved within each group.
pub fn select_context(history: &[Message], window_size: usize) -> Vec<Message> {
    let (system, turns): (Vec<&Message>, Vec<&Message>) =
        history.iter().partition(|m| m.is_system());

    let start = turns.len().saturating_sub(window_size);

    system
        .into_iter()
        .chain(turns[start..].iter().copied())
        .cloned()
        .collect()
}
