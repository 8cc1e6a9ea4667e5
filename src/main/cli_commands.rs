// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::Path;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use tally::chat::config::ChatConfig;
use tally::chat::display::ASSISTANT_LABEL;
use tally::cli::{AskArgs, SettingsArgs, SettingsCommands};
use tally::config::Settings;
use tally::error::Result;

use crate::chat_runtime::build_session;

/// Run settings subcommands
pub(super) fn run_settings_command(args: SettingsArgs, settings: Settings, path: &Path) -> Result<()> {
    match args.command.unwrap_or(SettingsCommands::Show) {
        SettingsCommands::Show => {
            let json = serde_json::to_string_pretty(&settings.redacted())?;
            println!("{}", json);
            if !settings.is_configured() {
                print_info(&format!(
                    "Not ready to chat: set {} and {} (or edit {}).",
                    settings.providers.watsonx.api_key_env,
                    settings.providers.watsonx.project_id_env,
                    path.display()
                ))?;
            }
        }
        SettingsCommands::Path => {
            println!("{}", path.display());
        }
        SettingsCommands::Init { force } => {
            if path.exists() && !force {
                print_error(&format!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                ))?;
                return Ok(());
            }
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            Settings::default().save_to(path)?;
            println!("Wrote default settings to {}", path.display());
        }
    }
    Ok(())
}

/// Ask a single question and print the reply
pub(super) async fn run_ask(args: AskArgs, settings: Settings) -> Result<()> {
    let mut session = build_session(&settings, &args.overrides)?;
    let result = session.send_message(&args.prompt).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(reply) = &result.message {
        println!("{}", reply);
    }

    if !result.success {
        if !args.json {
            print_error(result.error.as_deref().unwrap_or("request failed"))?;
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Print welcome message
pub(super) fn print_welcome(config: &ChatConfig) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("tally v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Your finance assistant in the terminal");
    println!("Model: {}", config.model_id);
    println!("Context window: {} messages", config.context_window);
    println!("Type /help for commands, /quit to exit\n");
    Ok(())
}

/// Print help message
pub(super) fn print_help() -> Result<()> {
    println!("\nCommands:");
    println!("  /clear          - Clear the conversation (keeps the system prompt)");
    println!("  /system [text]  - Show or replace the system prompt");
    println!("  /history        - List the conversation so far");
    println!("  /export [path]  - Save the conversation as JSON");
    println!("  /import <path>  - Load a conversation from JSON");
    println!("  /model          - Show model and window settings");
    println!("  /help           - Show this help message");
    println!("  /quit           - Exit tally");
    println!();
    Ok(())
}

/// Read one line of user input; `None` on end of input
pub(super) fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Print the response prefix with the assistant's name
pub(super) fn print_response_prefix() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\n{}: ", ASSISTANT_LABEL.to_lowercase());
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

/// Print a reply followed by a dimmed status line
pub(super) fn print_reply(reply: &str, footer: &str) -> Result<()> {
    println!("{}", reply);
    if !footer.is_empty() {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::DarkGrey))?;
        println!("  {}", footer);
        stdout.execute(ResetColor)?;
    }
    println!();
    Ok(())
}

pub(super) fn print_info(message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    println!("{}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_error(message: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("Error: {}", message);
    stderr.execute(ResetColor)?;
    Ok(())
}
