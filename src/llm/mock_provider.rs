// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Provides a scripted implementation of the LlmProvider trait that can be
//! used in unit and integration tests without making real API calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, Result};
use crate::llm::provider::{GenerationRequest, GenerationResult, LlmProvider, ModelInfo};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Scripted outcomes, consumed in order; the last one repeats
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<GenerationRequest>>>,
    /// Number of warm_up calls
    warm_ups: Arc<AtomicUsize>,
    /// Available models
    models: Vec<ModelInfo>,
}

/// A pre-configured outcome for the mock provider
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Successful generation
    Success(GenerationResult),
    /// Failed generation
    Failure(ApiError),
}

impl MockResponse {
    /// Successful generation with fixed token counts
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Success(GenerationResult {
            text: text.into(),
            input_token_count: 10,
            generated_token_count: 20,
            stop_reason: Some("eos_token".to_string()),
        })
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::text("Mock response")
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            warm_ups: Arc::new(AtomicUsize::new(0)),
            models: vec![Self::default_model()],
        }
    }

    fn default_model() -> ModelInfo {
        ModelInfo {
            id: "mock-model".to_string(),
            display_name: "Mock Model".to_string(),
            context_window: 8192,
            max_output_tokens: 1024,
        }
    }

    /// Set a single text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::text(text)])
    }

    /// Queue multiple text responses (returned in order)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.with_script(texts.into_iter().map(MockResponse::text).collect())
    }

    /// Fail every call with `error`
    pub fn with_error(self, error: ApiError) -> Self {
        self.with_script(vec![MockResponse::Failure(error)])
    }

    /// Replace the scripted outcomes
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = script;
        self
    }

    /// Get the number of times generate() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times warm_up() was called
    pub fn warm_up_count(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<GenerationRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::default()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    async fn warm_up(&self) -> Result<()> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        lock(&self.recorded_requests).push(request);

        match self.next_response() {
            MockResponse::Success(result) => Ok(result),
            MockResponse::Failure(error) => Err(error.into()),
        }
    }
}
