// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-session chat configuration
//!
//! A `ChatConfig` is fixed for the life of a session unless it is replaced
//! through `ChatSession::update_config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::llm::auth::{DEFAULT_IDENTITY_TIMEOUT, DEFAULT_IDENTITY_URL};
use crate::llm::params::GenerationParams;
use crate::llm::providers::watsonx::{
    GenerationTarget, DEFAULT_API_VERSION, DEFAULT_GENERATION_TIMEOUT, DEFAULT_MODEL,
    DEFAULT_SERVICE_URL,
};

pub const DEFAULT_CONTEXT_WINDOW: usize = 10;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Tally, a friendly assistant for personal finance tracking. \
Answer questions about spending, budgets and savings clearly and concisely.";

const REDACTED: &str = "[redacted]";

/// Complete configuration for one chat session
#[derive(Clone, PartialEq)]
pub struct ChatConfig {
    /// API key exchanged for bearer tokens
    pub api_key: String,
    pub service_url: String,
    pub identity_url: String,
    pub target: GenerationTarget,
    pub model_id: String,
    pub api_version: String,
    pub params: GenerationParams,
    pub system_prompt: String,
    /// Maximum number of non-system messages sent per request
    pub context_window: usize,
    pub identity_timeout: Duration,
    pub generation_timeout: Duration,
}

/// Configuration with every field optional, filled by [`ChatConfig::apply_defaults`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialChatConfig {
    pub api_key: Option<String>,
    pub service_url: Option<String>,
    pub identity_url: Option<String>,
    pub target: Option<GenerationTarget>,
    pub model_id: Option<String>,
    pub api_version: Option<String>,
    pub params: Option<GenerationParams>,
    pub system_prompt: Option<String>,
    pub context_window: Option<usize>,
    pub identity_timeout: Option<Duration>,
    pub generation_timeout: Option<Duration>,
}

/// Explicit change to a session's configuration
#[derive(Debug, Clone)]
pub enum ChatConfigUpdate {
    /// Replace the whole record
    Replace(ChatConfig),
    /// Replace only the fields that are set
    Patch(PartialChatConfig),
}

/// Configuration as written into exports, without the credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedConfig {
    pub api_key: String,
    pub service_url: String,
    pub target: GenerationTarget,
    pub model_id: String,
    pub api_version: String,
    pub params: GenerationParams,
    pub system_prompt: String,
    pub context_window: usize,
}

impl ChatConfig {
    /// Fill every unset field with its default
    pub fn apply_defaults(partial: PartialChatConfig) -> Self {
        Self {
            api_key: partial.api_key.unwrap_or_default(),
            service_url: partial
                .service_url
                .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
            identity_url: partial
                .identity_url
                .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string()),
            target: partial
                .target
                .unwrap_or_else(|| GenerationTarget::Project(String::new())),
            model_id: partial.model_id.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_version: partial
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            params: partial.params.unwrap_or_default(),
            system_prompt: partial
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            context_window: partial.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW),
            identity_timeout: partial.identity_timeout.unwrap_or(DEFAULT_IDENTITY_TIMEOUT),
            generation_timeout: partial
                .generation_timeout
                .unwrap_or(DEFAULT_GENERATION_TIMEOUT),
        }
    }

    /// Defaults plus the two values that have none
    pub fn new(api_key: impl Into<String>, target: GenerationTarget) -> Self {
        Self::apply_defaults(PartialChatConfig {
            api_key: Some(api_key.into()),
            target: Some(target),
            ..PartialChatConfig::default()
        })
    }

    /// Check that the record can reach the remote service
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TallyError::Config(
                "no API key configured (set WATSONX_API_KEY or providers.watsonx.api_key)"
                    .to_string(),
            ));
        }
        if self.target.id().trim().is_empty() {
            return Err(TallyError::Config(
                "no project or space id configured (set WATSONX_PROJECT_ID or providers.watsonx.project_id)"
                    .to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(TallyError::Config("model id is empty".to_string()));
        }
        Ok(())
    }

    /// The record after applying `update`
    pub fn updated(&self, update: ChatConfigUpdate) -> Self {
        match update {
            ChatConfigUpdate::Replace(config) => config,
            ChatConfigUpdate::Patch(patch) => {
                let current = self.clone();
                Self {
                    api_key: patch.api_key.unwrap_or(current.api_key),
                    service_url: patch.service_url.unwrap_or(current.service_url),
                    identity_url: patch.identity_url.unwrap_or(current.identity_url),
                    target: patch.target.unwrap_or(current.target),
                    model_id: patch.model_id.unwrap_or(current.model_id),
                    api_version: patch.api_version.unwrap_or(current.api_version),
                    params: patch.params.unwrap_or(current.params),
                    system_prompt: patch.system_prompt.unwrap_or(current.system_prompt),
                    context_window: patch.context_window.unwrap_or(current.context_window),
                    identity_timeout: patch.identity_timeout.unwrap_or(current.identity_timeout),
                    generation_timeout: patch
                        .generation_timeout
                        .unwrap_or(current.generation_timeout),
                }
            }
        }
    }

    /// Whether a provider built from `self` talks to the same endpoints as one built from `other`
    pub fn same_connection(&self, other: &ChatConfig) -> bool {
        self.api_key == other.api_key
            && self.service_url == other.service_url
            && self.identity_url == other.identity_url
            && self.target == other.target
            && self.api_version == other.api_version
            && self.identity_timeout == other.identity_timeout
            && self.generation_timeout == other.generation_timeout
    }

    /// Copy safe to write to disk or show on screen
    pub fn redacted(&self) -> ExportedConfig {
        ExportedConfig {
            api_key: REDACTED.to_string(),
            service_url: self.service_url.clone(),
            target: self.target.clone(),
            model_id: self.model_id.clone(),
            api_version: self.api_version.clone(),
            params: self.params.clone(),
            system_prompt: self.system_prompt.clone(),
            context_window: self.context_window,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::apply_defaults(PartialChatConfig::default())
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &REDACTED)
            .field("service_url", &self.service_url)
            .field("identity_url", &self.identity_url)
            .field("target", &self.target)
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("params", &self.params)
            .field("system_prompt", &self.system_prompt)
            .field("context_window", &self.context_window)
            .field("identity_timeout", &self.identity_timeout)
            .field("generation_timeout", &self.generation_timeout)
            .finish()
    }
}
