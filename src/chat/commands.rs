// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command handling for the chat interface
//!
//! Parses a line typed at the chat prompt into a [`ChatCommand`] so the
//! routing logic can be tested without a terminal.

use std::path::PathBuf;

/// What a line of chat input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Leave the chat
    Exit,
    /// Drop the conversation, keeping the system prompt
    Clear,
    Help,
    /// List the conversation so far
    History,
    /// Show the system prompt, or replace it when text is given
    System(Option<String>),
    /// Write the conversation to a file (default location when absent)
    Export(Option<PathBuf>),
    /// Load a conversation from a file
    Import(Option<PathBuf>),
    /// Show model and window settings
    Model,
    /// Regular user message
    Message(String),
    Empty,
    /// Unknown slash command
    Unknown(String),
}

fn argument(rest: &str) -> Option<String> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Parse user input into a ChatCommand
pub fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatCommand::Empty;
    }

    if matches!(trimmed, "exit" | "quit") {
        return ChatCommand::Exit;
    }

    let Some(command_line) = trimmed.strip_prefix('/') else {
        return ChatCommand::Message(trimmed.to_string());
    };

    let (name, rest) = command_line
        .split_once(char::is_whitespace)
        .unwrap_or((command_line, ""));

    match name.to_lowercase().as_str() {
        "quit" | "exit" | "q" => ChatCommand::Exit,
        "clear" => ChatCommand::Clear,
        "help" | "?" => ChatCommand::Help,
        "history" => ChatCommand::History,
        "system" => ChatCommand::System(argument(rest)),
        "export" => ChatCommand::Export(argument(rest).map(PathBuf::from)),
        "import" => ChatCommand::Import(argument(rest).map(PathBuf::from)),
        "model" => ChatCommand::Model,
        _ => ChatCommand::Unknown(format!("/{name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_empty() {
        assert_eq!(parse_command(""), ChatCommand::Empty);
        assert_eq!(parse_command("   \n"), ChatCommand::Empty);
    }

    #[test]
    fn test_parse_command_exit() {
        assert_eq!(parse_command("exit"), ChatCommand::Exit);
        assert_eq!(parse_command("/quit"), ChatCommand::Exit);
        assert_eq!(parse_command("/Q"), ChatCommand::Exit);
    }

    #[test]
    fn test_parse_command_clear_help_history() {
        assert_eq!(parse_command("/clear"), ChatCommand::Clear);
        assert_eq!(parse_command("/help"), ChatCommand::Help);
        assert_eq!(parse_command("/history"), ChatCommand::History);
        assert_eq!(parse_command("/model"), ChatCommand::Model);
    }

    #[test]
    fn test_parse_command_system() {
        assert_eq!(parse_command("/system"), ChatCommand::System(None));
        assert_eq!(
            parse_command("/system  Answer in euros. "),
            ChatCommand::System(Some("Answer in euros.".to_string()))
        );
    }

    #[test]
    fn test_parse_command_export_import() {
        assert_eq!(parse_command("/export"), ChatCommand::Export(None));
        assert_eq!(
            parse_command("/export chats/today.json"),
            ChatCommand::Export(Some(PathBuf::from("chats/today.json")))
        );
        assert_eq!(parse_command("/import"), ChatCommand::Import(None));
    }

    #[test]
    fn test_parse_command_message() {
        assert_eq!(
            parse_command("  how much did I spend?  "),
            ChatCommand::Message("how much did I spend?".to_string())
        );
    }

    #[test]
    fn test_parse_command_unknown() {
        assert_eq!(
            parse_command("/frobnicate now"),
            ChatCommand::Unknown("/frobnicate".to_string())
        );
    }
}
