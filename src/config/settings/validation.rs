// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::time::Duration;

use crate::chat::config::{ChatConfig, PartialChatConfig};
use crate::error::{Result, TallyError};
use crate::llm::providers::watsonx::GenerationTarget;

use super::Settings;

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Get the watsonx API key, checking env var first.
    pub fn get_api_key(&self) -> Option<String> {
        // Priority: env var > config file.
        env_value(&self.providers.watsonx.api_key_env)
            .or_else(|| non_empty(&self.providers.watsonx.api_key))
    }

    /// Get the project id, checking env var first.
    pub fn get_project_id(&self) -> Option<String> {
        env_value(&self.providers.watsonx.project_id_env)
            .or_else(|| non_empty(&self.providers.watsonx.project_id))
    }

    /// Get the service base URL, checking env var first.
    pub fn get_base_url(&self) -> String {
        env_value(&self.providers.watsonx.base_url_env)
            .unwrap_or_else(|| self.providers.watsonx.base_url.clone())
    }

    /// Project if one is configured, otherwise the deployment space.
    pub fn generation_target(&self) -> Option<GenerationTarget> {
        self.get_project_id()
            .map(GenerationTarget::Project)
            .or_else(|| non_empty(&self.providers.watsonx.space_id).map(GenerationTarget::Space))
    }

    /// Whether a credential and a project or space are available.
    pub fn is_configured(&self) -> bool {
        self.get_api_key().is_some() && self.generation_target().is_some()
    }

    /// Build the session configuration.
    pub fn to_chat_config(&self) -> Result<ChatConfig> {
        let api_key = self.get_api_key().ok_or_else(|| {
            TallyError::Config(format!(
                "no API key configured; set {} or providers.watsonx.api_key in {}",
                self.providers.watsonx.api_key_env,
                Self::default_path().display()
            ))
        })?;
        let target = self.generation_target().ok_or_else(|| {
            TallyError::Config(format!(
                "no project or space configured; set {} or providers.watsonx.project_id",
                self.providers.watsonx.project_id_env
            ))
        })?;

        let watsonx = &self.providers.watsonx;
        Ok(ChatConfig::apply_defaults(PartialChatConfig {
            api_key: Some(api_key),
            service_url: Some(self.get_base_url()),
            identity_url: Some(watsonx.identity_url.clone()),
            target: Some(target),
            model_id: Some(watsonx.default_model.clone()),
            api_version: Some(watsonx.api_version.clone()),
            params: Some(self.defaults.params.sanitized()),
            system_prompt: Some(self.defaults.system_prompt.clone()),
            context_window: Some(self.defaults.context_window),
            identity_timeout: Some(Duration::from_secs(self.network.identity_timeout_secs)),
            generation_timeout: Some(Duration::from_secs(self.network.generation_timeout_secs)),
        }))
    }

    /// Copy with the stored credential masked, for display.
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        if copy.providers.watsonx.api_key.is_some() {
            copy.providers.watsonx.api_key = Some("[redacted]".to_string());
        }
        copy
    }
}
