// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Tally
//!
//! Handles loading and saving settings from ~/.tally/settings.json

use serde::{Deserialize, Serialize};

use crate::chat::config::{DEFAULT_CONTEXT_WINDOW, DEFAULT_SYSTEM_PROMPT};
use crate::llm::auth::DEFAULT_IDENTITY_URL;
use crate::llm::params::{deserialize_lenient, GenerationParams};
use crate::llm::providers::watsonx::{DEFAULT_API_VERSION, DEFAULT_MODEL, DEFAULT_SERVICE_URL};

mod io;
mod validation;

/// Main settings structure, stored in ~/.tally/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// LLM provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Network time bounds
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub watsonx: WatsonxConfig,
}

/// watsonx.ai configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct WatsonxConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default = "default_project_id_env")]
    pub project_id_env: String,

    /// Deployment space, used when no project id is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,

    /// Regional service endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,

    /// Identity token endpoint
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Default model to use
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Value of the `version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Default settings for new sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Non-system messages sent per request
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Sampling knobs; unusable values fall back to defaults
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub params: GenerationParams,
}

/// Network time bounds, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_identity_timeout_secs")]
    pub identity_timeout_secs: u64,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

// Default value functions

fn default_api_key_env() -> String {
    "WATSONX_API_KEY".to_string()
}

fn default_project_id_env() -> String {
    "WATSONX_PROJECT_ID".to_string()
}

fn default_base_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_base_url_env() -> String {
    "WATSONX_URL".to_string()
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_context_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

fn default_identity_timeout_secs() -> u64 {
    30
}

fn default_generation_timeout_secs() -> u64 {
    60
}

impl Default for WatsonxConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            project_id: None,
            project_id_env: default_project_id_env(),
            space_id: None,
            base_url: default_base_url(),
            base_url_env: default_base_url_env(),
            identity_url: default_identity_url(),
            default_model: default_model(),
            api_version: default_api_version(),
        }
    }
}

impl std::fmt::Debug for WatsonxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatsonxConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_key_env", &self.api_key_env)
            .field("project_id", &self.project_id)
            .field("project_id_env", &self.project_id_env)
            .field("space_id", &self.space_id)
            .field("base_url", &self.base_url)
            .field("base_url_env", &self.base_url_env)
            .field("identity_url", &self.identity_url)
            .field("default_model", &self.default_model)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            context_window: default_context_window(),
            params: GenerationParams::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            identity_timeout_secs: default_identity_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}
