// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! This module provides the session façade, its configuration record and
//! conversation import/export.

pub mod commands;
pub mod config;
pub mod display;
pub mod session;
pub mod transcript;

pub use commands::{parse_command, ChatCommand};
pub use config::{ChatConfig, ChatConfigUpdate, ExportedConfig, PartialChatConfig};
pub use session::{ChatResult, ChatSession, ChatSessionBuilder, Usage};
pub use transcript::{ConversationEntry, ConversationExport, ImportMessage};
