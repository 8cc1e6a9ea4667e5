// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tally - conversational assistant client for personal finance tracking.
//!
//! This crate exposes the chat runtime used by the `tally` CLI
//! (`src/main.rs`) and by any other front end that wants a bounded,
//! authenticated conversation with a hosted text-generation model.
//!
//! Architecture highlights:
//! - `chat`: session façade, per-session configuration, import/export
//! - `llm`: messages, context window, prompt rendering, token manager and
//!   the watsonx.ai generation provider
//! - `config`: on-disk settings and environment overrides
//! - `cli`: command-line argument definitions

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;

pub use error::{Result, TallyError};
