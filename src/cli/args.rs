// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Tally.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tally - chat with your finance assistant from the terminal
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about = "Chat with your finance assistant from the terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.tally/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Show or initialize settings
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

/// Overrides shared by `chat` and `ask`
#[derive(clap::Args, Debug, Default, Clone)]
pub struct SessionOverrides {
    /// Model to use (e.g. ibm/granite-3-8b-instruct)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt for this session
    #[arg(short, long)]
    pub system: Option<String>,

    /// Number of recent messages sent with each request
    #[arg(short = 'w', long)]
    pub window: Option<usize>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0 = greedy)
    #[arg(short, long)]
    pub temperature: Option<f64>,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    #[command(flatten)]
    pub overrides: SessionOverrides,

    /// Load a conversation before the first prompt
    #[arg(long)]
    pub import: Option<PathBuf>,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    #[command(flatten)]
    pub overrides: SessionOverrides,

    /// Print the reply as a JSON chat result
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the settings subcommand
#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommands>,
}

/// Settings subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SettingsCommands {
    /// Show current configuration (credentials redacted)
    Show,

    /// Print the settings file path
    Path,

    /// Write a settings file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
