// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! Encapsulates the state of one conversation: its configuration, its
//! message log and the provider that answers it. `send_message` never
//! returns an error; failures are reported inside the [`ChatResult`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chat::config::{ChatConfig, ChatConfigUpdate};
use crate::chat::transcript::{parse_import, ConversationEntry, ConversationExport, ImportMessage};
use crate::error::{Result, TallyError};
use crate::llm::auth::{TokenCache, TokenManager};
use crate::llm::message::{Conversation, Message};
use crate::llm::prompt::format_prompt;
use crate::llm::provider::{GenerationRequest, GenerationResult, LlmProvider};
use crate::llm::providers::watsonx::WatsonxProvider;
use crate::llm::window::select_context;

/// Token usage for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u64,
}

impl From<&GenerationResult> for Usage {
    fn from(result: &GenerationResult) -> Self {
        Self {
            input_tokens: result.input_token_count,
            output_tokens: result.generated_token_count,
            total_tokens: result.total_tokens(),
        }
    }
}

/// Outcome of a send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResult {
    fn success(result: &GenerationResult, conversation_length: usize) -> Self {
        Self {
            success: true,
            message: Some(result.text.clone()),
            usage: Some(Usage::from(result)),
            conversation_length: Some(conversation_length),
            error: None,
        }
    }

    fn failure(error: &TallyError, conversation_length: usize) -> Self {
        Self {
            success: false,
            message: None,
            usage: None,
            conversation_length: Some(conversation_length),
            error: Some(error.user_message()),
        }
    }
}

/// A single conversation with the remote model
pub struct ChatSession {
    config: ChatConfig,
    conversation: Conversation,
    provider: Arc<dyn LlmProvider>,
    /// Provider was built from `config` and must follow its changes
    owns_provider: bool,
    token_cache: TokenCache,
    initialized: bool,
}

/// Builder for creating ChatSession instances
pub struct ChatSessionBuilder {
    config: ChatConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    token_cache: Option<TokenCache>,
}

impl ChatSessionBuilder {
    /// Create a new builder
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            provider: None,
            token_cache: None,
        }
    }

    /// Use this provider instead of building one from the config
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Share a token cache with other sessions. Only the built-in provider
    /// reads it, so `build` rejects it alongside `with_provider`.
    pub fn with_token_cache(mut self, cache: TokenCache) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Build the session
    pub fn build(self) -> Result<ChatSession> {
        if self.provider.is_some() && self.token_cache.is_some() {
            return Err(TallyError::Config(
                "a shared token cache cannot be used with an injected provider".to_string(),
            ));
        }
        let token_cache = self.token_cache.unwrap_or_default();

        let (provider, owns_provider) = match self.provider {
            Some(provider) => (provider, false),
            None => (build_provider(&self.config, &token_cache)?, true),
        };

        debug!(
            provider = provider.name(),
            model = %self.config.model_id,
            context_window = self.config.context_window,
            "Chat session created"
        );

        Ok(ChatSession {
            conversation: Conversation::with_system(self.config.system_prompt.clone()),
            config: self.config,
            provider,
            owns_provider,
            token_cache,
            initialized: false,
        })
    }
}

fn build_provider(config: &ChatConfig, cache: &TokenCache) -> Result<Arc<dyn LlmProvider>> {
    config.validate()?;
    let tokens = TokenManager::with_options(
        config.api_key.clone(),
        config.identity_url.clone(),
        cache.clone(),
        config.identity_timeout,
    )?;
    let provider = WatsonxProvider::with_options(
        tokens,
        config.target.clone(),
        config.service_url.clone(),
        config.api_version.clone(),
        config.generation_timeout,
    )?;
    Ok(Arc::new(provider))
}

impl ChatSession {
    /// Start building a session
    pub fn builder(config: ChatConfig) -> ChatSessionBuilder {
        ChatSessionBuilder::new(config)
    }

    /// Session backed by the watsonx provider with a private token cache
    pub fn new(config: ChatConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Session backed by an existing provider
    pub fn with_provider(config: ChatConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let token_cache = TokenCache::new();
        Self {
            conversation: Conversation::with_system(config.system_prompt.clone()),
            config,
            provider,
            owns_provider: false,
            token_cache,
            initialized: false,
        }
    }

    /// Fetch credentials ahead of the first send. Idempotent.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.provider.warm_up().await?;
        self.initialized = true;
        info!(provider = self.provider.name(), "Chat session initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Send one user message and append the reply.
    ///
    /// The user message stays in the history even when generation fails.
    pub async fn send_message(&mut self, text: &str) -> ChatResult {
        let text = text.trim();
        if text.is_empty() {
            let err = TallyError::InvalidInput("message is empty".to_string());
            return ChatResult::failure(&err, self.conversation.len());
        }

        match self.exchange(text).await {
            Ok(result) => {
                let length = self.conversation.len();
                info!(
                    input_tokens = result.input_token_count,
                    output_tokens = result.generated_token_count,
                    conversation_length = length,
                    "Message exchanged"
                );
                ChatResult::success(&result, length)
            }
            Err(err) => {
                warn!(error = %err, "Send failed");
                ChatResult::failure(&err, self.conversation.len())
            }
        }
    }

    async fn exchange(&mut self, text: &str) -> Result<GenerationResult> {
        let mut context = select_context(self.conversation.messages(), self.config.context_window);

        let user = Message::user(text);
        context.push(user.clone());
        self.conversation.push(user);

        self.initialize().await?;

        if !self.provider.supports_model(&self.config.model_id) {
            debug!(model = %self.config.model_id, "Model is not in the known-good list");
        }

        let request = GenerationRequest::new(self.config.model_id.clone(), format_prompt(&context))
            .with_parameters(self.config.params.sanitized());

        debug!(
            context_messages = context.len(),
            prompt_chars = request.input.len(),
            "Prepared generation request"
        );

        let result = self.provider.generate(request).await?;
        self.conversation.push(Message::assistant(result.text.clone()));
        Ok(result)
    }

    /// Send messages in order, stopping after the first failure
    pub async fn send_messages<S: AsRef<str>>(&mut self, texts: &[S]) -> Vec<ChatResult> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let result = self.send_message(text.as_ref()).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Drop every non-system message
    pub fn clear_conversation(&mut self) {
        self.conversation.clear();
        info!("Conversation cleared");
    }

    /// Replace the system prompt. Empty text removes it.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.conversation.set_system_prompt(text.clone());
        self.config.system_prompt = text;
        info!("System prompt updated");
    }

    /// Non-system messages with display times
    pub fn get_conversation(&self) -> Vec<ConversationEntry> {
        self.conversation
            .turns()
            .map(ConversationEntry::from)
            .collect()
    }

    /// Number of non-system messages
    pub fn get_conversation_length(&self) -> usize {
        self.conversation.len()
    }

    /// Every stored message, system messages included
    pub fn history(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn export_conversation(&self) -> ConversationExport {
        ConversationExport {
            config: self.config.redacted(),
            messages: self.get_conversation(),
            export_timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Replace the history from a JSON payload (message list or export object)
    pub fn import_conversation(&mut self, payload: &Value) -> Result<usize> {
        let messages = parse_import(payload)?;
        self.import_messages(messages)
    }

    /// Replace the history, keeping the system prompt
    pub fn import_messages(&mut self, messages: Vec<ImportMessage>) -> Result<usize> {
        let now = Utc::now();
        let messages = messages.into_iter().map(|m| m.into_message(now)).collect();
        let count = self
            .conversation
            .import(messages)
            .inspect_err(|e| warn!(error = %e, "Import rejected"))?;
        info!(count, "Conversation imported");
        Ok(count)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Apply an explicit configuration change.
    ///
    /// When the session built its own provider and the connection settings
    /// changed, the provider is rebuilt. A changed credential also drops the
    /// cached token. Nothing changes if the new record is invalid.
    pub fn update_config(&mut self, update: ChatConfigUpdate) -> Result<()> {
        let next = self.config.updated(update);
        next.validate()?;
        let connection_changed = !next.same_connection(&self.config);

        if self.owns_provider && connection_changed {
            self.provider = build_provider(&next, &self.token_cache)?;
        }

        if next.api_key != self.config.api_key || next.identity_url != self.config.identity_url {
            self.token_cache.invalidate();
        }

        if connection_changed {
            self.initialized = false;
        }

        if next.system_prompt != self.config.system_prompt {
            self.conversation.set_system_prompt(next.system_prompt.clone());
        }

        self.config = next;
        info!(model = %self.config.model_id, "Chat configuration updated");
        Ok(())
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }
}
