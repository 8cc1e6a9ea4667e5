// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! Defines the abstraction layer between the chat session and the remote
//! text-generation backend.

use async_trait::async_trait;
use crate::error::Result;
use crate::llm::params::GenerationParams;

/// Main trait for text-generation providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "watsonx")
    fn name(&self) -> &str;

    /// List known-good models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Check if a specific model is in the known-good list
    fn supports_model(&self, model: &str) -> bool {
        self.available_models().iter().any(|m| m.id == model)
    }

    /// Prepare credentials ahead of the first request
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Generate a continuation of a flat prompt
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult>;
}

/// Request for a generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model to use
    pub model_id: String,

    /// Formatted prompt
    pub input: String,

    /// Sampling parameters (already sanitized)
    pub parameters: GenerationParams,
}

/// Outcome of a successful generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    /// Generated text, trimmed
    pub text: String,

    /// Tokens consumed by the prompt
    pub input_token_count: u32,

    /// Tokens produced
    pub generated_token_count: u32,

    /// Why generation stopped, as reported by the service
    pub stop_reason: Option<String>,
}

/// Information about a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Human-readable name
    pub display_name: String,

    /// Maximum context window in tokens
    pub context_window: u32,

    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    /// Create a request with default parameters
    pub fn new(model_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            input: input.into(),
            parameters: GenerationParams::default(),
        }
    }

    /// Set the sampling parameters
    pub fn with_parameters(mut self, parameters: GenerationParams) -> Self {
        self.parameters = parameters;
        self
    }
}

impl GenerationResult {
    /// Prompt plus generated tokens, widened so server counts cannot overflow
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.input_token_count) + u64::from(self.generated_token_count)
    }
}
