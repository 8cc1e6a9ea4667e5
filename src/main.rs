// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tally - chat with your finance assistant from the terminal
//!
//! Entry point for the Tally CLI application.

use clap::Parser;

use tally::cli::{ChatArgs, Cli, Commands};
use tally::config::Settings;
use tally::error::Result;

#[path = "main/chat_runtime.rs"]
mod chat_runtime;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use chat_runtime::run_chat;
use cli_commands::{run_ask, run_settings_command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session and network diagnostics; `RUST_LOG` still applies.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "tally=trace"
        } else {
            "tally=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)?;

    // Dispatch to appropriate command
    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings).await?,
        Some(Commands::Settings(args)) => run_settings_command(args, settings, &settings_path)?,
    }

    Ok(())
}
