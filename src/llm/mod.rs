// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Tally
//!
//! Messages, prompt construction, credentials and the text-generation
//! provider abstraction.

pub mod auth;
pub mod message;
pub mod mock_provider;
pub mod params;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod window;

pub use auth::{AccessToken, TokenCache, TokenManager};
pub use message::*;
pub use params::{sanitize_params, DecodingMethod, GenerationParams};
pub use prompt::format_prompt;
pub use provider::*;
pub use window::select_context;
