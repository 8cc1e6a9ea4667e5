// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::PathBuf;

use tally::chat::config::{ChatConfig, ChatConfigUpdate, PartialChatConfig};
use tally::chat::display::{format_history, format_result_footer};
use tally::chat::transcript::load_import;
use tally::chat::{parse_command, ChatCommand, ChatSession};
use tally::cli::{ChatArgs, SessionOverrides};
use tally::config::Settings;
use tally::error::Result;

use crate::cli_commands::{
    print_error, print_help, print_info, print_reply, print_response_prefix, print_welcome,
    read_user_input,
};

const HISTORY_PREVIEW_CHARS: usize = 100;

/// Apply command-line overrides on top of the configured session record
pub(super) fn apply_overrides(config: &ChatConfig, overrides: &SessionOverrides) -> ChatConfig {
    let params = (overrides.max_tokens.is_some() || overrides.temperature.is_some()).then(|| {
        let mut params = config.params.clone();
        if let Some(max_tokens) = overrides.max_tokens {
            params.max_new_tokens = max_tokens;
        }
        if let Some(temperature) = overrides.temperature {
            params.temperature = temperature;
        }
        params.sanitized()
    });

    config.updated(ChatConfigUpdate::Patch(PartialChatConfig {
        model_id: overrides.model.clone(),
        system_prompt: overrides.system.clone(),
        context_window: overrides.window,
        params,
        ..PartialChatConfig::default()
    }))
}

/// Build a session from settings plus overrides
pub(super) fn build_session(settings: &Settings, overrides: &SessionOverrides) -> Result<ChatSession> {
    let config = apply_overrides(&settings.to_chat_config()?, overrides);
    ChatSession::new(config)
}

fn default_export_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Settings::transcripts_dir().join(format!("tally-{stamp}.json"))
}

/// Run interactive chat mode
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let mut session = build_session(&settings, &args.overrides)?;

    if let Some(path) = &args.import {
        let count = session.import_messages(load_import(path)?)?;
        print_info(&format!("Imported {count} messages from {}", path.display()))?;
    }

    print_welcome(session.config())?;

    if let Err(e) = session.initialize().await {
        print_error(&e.user_message())?;
    }

    while let Some(input) = read_user_input()? {
        match parse_command(&input) {
            ChatCommand::Empty => continue,
            ChatCommand::Exit => break,
            ChatCommand::Help => print_help()?,
            ChatCommand::Clear => {
                session.clear_conversation();
                print_info("Conversation cleared.")?;
            }
            ChatCommand::History => {
                println!(
                    "{}",
                    format_history(&session.get_conversation(), HISTORY_PREVIEW_CHARS)
                );
            }
            ChatCommand::System(None) => {
                println!("{}", session.config().system_prompt);
            }
            ChatCommand::System(Some(text)) => {
                session.set_system_prompt(text);
                print_info("System prompt updated.")?;
            }
            ChatCommand::Model => {
                let config = session.config();
                print_info(&format!(
                    "Model: {} | window: {} messages | max tokens: {}",
                    config.model_id, config.context_window, config.params.max_new_tokens
                ))?;
            }
            ChatCommand::Export(path) => {
                let path = path.unwrap_or_else(default_export_path);
                match session.export_conversation().save_to(&path) {
                    Ok(()) => print_info(&format!("Saved conversation to {}", path.display()))?,
                    Err(e) => print_error(&e.user_message())?,
                }
            }
            ChatCommand::Import(None) => print_error("Usage: /import <file.json>")?,
            ChatCommand::Import(Some(path)) => {
                match load_import(&path).and_then(|messages| session.import_messages(messages)) {
                    Ok(count) => print_info(&format!("Imported {count} messages."))?,
                    Err(e) => print_error(&e.user_message())?,
                }
            }
            ChatCommand::Unknown(name) => {
                print_error(&format!("Unknown command {name}. Type /help for commands."))?;
            }
            ChatCommand::Message(text) => {
                print_response_prefix()?;
                let result = session.send_message(&text).await;
                match (&result.message, &result.error) {
                    (Some(reply), _) => {
                        print_reply(reply, &format_result_footer(&result))?;
                    }
                    (None, Some(error)) => print_error(error)?,
                    (None, None) => println!(),
                }
            }
        }
    }

    Ok(())
}
