// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! watsonx.ai text-generation provider
//!
//! Sends flat prompts to `/ml/v1/text/generation` with a bearer token from
//! the [`TokenManager`] and turns the service's structured error bodies into
//! actionable errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ApiError, Result, TallyError};
use crate::llm::auth::TokenManager;
use crate::llm::provider::{GenerationRequest, GenerationResult, LlmProvider, ModelInfo};

pub const DEFAULT_SERVICE_URL: &str = "https://us-south.ml.cloud.ibm.com";
pub const DEFAULT_API_VERSION: &str = "2023-05-29";
pub const DEFAULT_MODEL: &str = "ibm/granite-3-8b-instruct";
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

const GENERATION_PATH: &str = "/ml/v1/text/generation";

/// Where generations are billed: a project or a deployment space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum GenerationTarget {
    Project(String),
    Space(String),
}

impl GenerationTarget {
    /// Request body field carrying the identifier
    pub fn field(&self) -> &'static str {
        match self {
            GenerationTarget::Project(_) => "project_id",
            GenerationTarget::Space(_) => "space_id",
        }
    }

    /// The identifier itself
    pub fn id(&self) -> &str {
        match self {
            GenerationTarget::Project(id) | GenerationTarget::Space(id) => id,
        }
    }

    fn describe(&self) -> String {
        match self {
            GenerationTarget::Project(id) => format!("Project '{id}'"),
            GenerationTarget::Space(id) => format!("Space '{id}'"),
        }
    }
}

/// Known-good chat models, also used as suggestions when a model is rejected
pub fn known_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "ibm/granite-3-8b-instruct".to_string(),
            display_name: "Granite 3 8B Instruct".to_string(),
            context_window: 131_072,
            max_output_tokens: 8_192,
        },
        ModelInfo {
            id: "ibm/granite-13b-chat-v2".to_string(),
            display_name: "Granite 13B Chat v2".to_string(),
            context_window: 8_192,
            max_output_tokens: 4_096,
        },
        ModelInfo {
            id: "meta-llama/llama-3-3-70b-instruct".to_string(),
            display_name: "Llama 3.3 70B Instruct".to_string(),
            context_window: 131_072,
            max_output_tokens: 4_096,
        },
        ModelInfo {
            id: "mistralai/mixtral-8x7b-instruct-v01".to_string(),
            display_name: "Mixtral 8x7B Instruct".to_string(),
            context_window: 32_768,
            max_output_tokens: 4_096,
        },
    ]
}

/// Text-generation client for watsonx.ai
pub struct WatsonxProvider {
    client: Client,
    tokens: TokenManager,
    service_url: String,
    api_version: String,
    target: GenerationTarget,
}

impl WatsonxProvider {
    /// Create a provider against the default regional endpoint
    pub fn new(tokens: TokenManager, target: GenerationTarget) -> Result<Self> {
        Self::with_options(
            tokens,
            target,
            DEFAULT_SERVICE_URL,
            DEFAULT_API_VERSION,
            DEFAULT_GENERATION_TIMEOUT,
        )
    }

    /// Create with an explicit service URL, API version and request timeout
    pub fn with_options(
        tokens: TokenManager,
        target: GenerationTarget,
        service_url: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            tokens,
            service_url: service_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            target,
        })
    }

    /// Full generation endpoint, without the version query
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.service_url, GENERATION_PATH)
    }

    /// Token manager backing this provider
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Build the JSON request body
    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "input": request.input,
            "parameters": request.parameters,
            "model_id": request.model_id,
        });
        body[self.target.field()] = serde_json::Value::String(self.target.id().to_string());
        body
    }

    /// Classify an error response
    fn parse_error(&self, status: StatusCode, body: &str, model: &str) -> TallyError {
        let entry = serde_json::from_str::<WatsonxErrorBody>(body)
            .ok()
            .and_then(|b| b.errors.into_iter().next());

        let Some(entry) = entry else {
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.to_string()
            };
            return ApiError::Generation {
                status: status.as_u16(),
                code: None,
                message,
            }
            .into();
        };

        match entry.code.as_str() {
            "model_not_supported" => ApiError::ModelNotSupported {
                model: model.to_string(),
                suggestions: known_models().into_iter().map(|m| m.id).collect(),
            },
            "no_associated_service_instance_error" => ApiError::NoServiceInstance {
                target: self.target.describe(),
            },
            _ => ApiError::Generation {
                status: status.as_u16(),
                code: Some(entry.code),
                message: entry.message,
            },
        }
        .into()
    }
}

#[async_trait]
impl LlmProvider for WatsonxProvider {
    fn name(&self) -> &str {
        "watsonx"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        known_models()
    }

    async fn warm_up(&self) -> Result<()> {
        self.tokens.get_token().await.map(|_| ())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let token = self.tokens.get_token().await?;
        let body = self.build_body(&request);

        debug!(
            model = %request.model_id,
            prompt_chars = request.input.len(),
            "Sending generation request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("version", self.api_version.as_str())])
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::from_transport("Generation", &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport("Generation", &e))?;

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Token was revoked or expired early; force a fresh exchange next time.
                self.tokens.cache().invalidate();
            }
            let err = self.parse_error(status, &text, &request.model_id);
            warn!(status = status.as_u16(), error = %err, "Generation request failed");
            return Err(err);
        }

        let parsed: WatsonxResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Protocol(format!("invalid generation response: {e}")))?;

        let result = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Protocol("response contained no results".to_string()))?;

        debug!(
            input_tokens = result.input_token_count,
            generated_tokens = result.generated_token_count,
            stop_reason = result.stop_reason.as_deref().unwrap_or("-"),
            "Generation completed"
        );

        Ok(GenerationResult {
            text: result.generated_text.trim().to_string(),
            input_token_count: result.input_token_count,
            generated_token_count: result.generated_token_count,
            stop_reason: result.stop_reason,
        })
    }
}

// watsonx.ai API types

#[derive(Debug, Deserialize)]
struct WatsonxResponse {
    #[serde(default)]
    results: Option<Vec<WatsonxResult>>,
}

#[derive(Debug, Deserialize)]
struct WatsonxResult {
    #[serde(default)]
    generated_text: String,
    #[serde(default)]
    input_token_count: u32,
    #[serde(default)]
    generated_token_count: u32,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WatsonxErrorBody {
    #[serde(default)]
    errors: Vec<WatsonxErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct WatsonxErrorEntry {
    code: String,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::auth::TokenCache;
    use crate::llm::params::GenerationParams;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_identity(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "bearer-123",
                "expires_in": 3600,
            })))
            .mount(server)
            .await;
    }

    fn provider_with(
        server: &MockServer,
        target: GenerationTarget,
        timeout: Duration,
    ) -> WatsonxProvider {
        let tokens = TokenManager::with_options(
            "key",
            format!("{}/identity/token", server.uri()),
            TokenCache::new(),
            Duration::from_secs(5),
        )
        .unwrap();
        WatsonxProvider::with_options(tokens, target, server.uri(), "2023-05-29", timeout).unwrap()
    }

    fn provider(server: &MockServer) -> WatsonxProvider {
        provider_with(
            server,
            GenerationTarget::Project("proj-1".to_string()),
            Duration::from_secs(5),
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(DEFAULT_MODEL, "Human: hi\nAssistant:")
    }

    #[test]
    fn test_provider_name_and_models() {
        let tokens = TokenManager::new("key").unwrap();
        let provider =
            WatsonxProvider::new(tokens, GenerationTarget::Project("p".to_string())).unwrap();
        assert_eq!(provider.name(), "watsonx");
        assert!(provider.supports_model(DEFAULT_MODEL));
        assert!(!provider.supports_model("acme/unknown"));
        assert_eq!(
            provider.endpoint(),
            "https://us-south.ml.cloud.ibm.com/ml/v1/text/generation"
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let tokens = TokenManager::new("key").unwrap();
        let provider = WatsonxProvider::with_options(
            tokens,
            GenerationTarget::Project("p".to_string()),
            "https://eu-de.ml.cloud.ibm.com/",
            DEFAULT_API_VERSION,
            DEFAULT_GENERATION_TIMEOUT,
        )
        .unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://eu-de.ml.cloud.ibm.com/ml/v1/text/generation"
        );
    }

    #[test]
    fn test_build_body_space_target() {
        let tokens = TokenManager::new("key").unwrap();
        let provider =
            WatsonxProvider::new(tokens, GenerationTarget::Space("space-9".to_string())).unwrap();
        let body = provider.build_body(&request());

        assert_eq!(body["space_id"], "space-9");
        assert!(body.get("project_id").is_none());
        assert_eq!(body["model_id"], DEFAULT_MODEL);
        assert_eq!(body["parameters"]["max_new_tokens"], 256);
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .and(query_param("version", "2023-05-29"))
            .and(header("authorization", "Bearer bearer-123"))
            .and(body_partial_json(serde_json::json!({
                "input": "Human: hi\nAssistant:",
                "model_id": DEFAULT_MODEL,
                "project_id": "proj-1",
                "parameters": {"max_new_tokens": 100},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model_id": DEFAULT_MODEL,
                "results": [{
                    "generated_text": "  You spent $42 on coffee.  ",
                    "generated_token_count": 9,
                    "input_token_count": 7,
                    "stop_reason": "eos_token",
                }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params = GenerationParams {
            max_new_tokens: 100,
            ..GenerationParams::default()
        };
        let result = provider(&server)
            .generate(request().with_parameters(params))
            .await
            .unwrap();

        assert_eq!(result.text, "You spent $42 on coffee.");
        assert_eq!(result.input_token_count, 7);
        assert_eq!(result.generated_token_count, 9);
        assert_eq!(result.stop_reason.as_deref(), Some("eos_token"));
    }

    #[tokio::test]
    async fn test_generate_empty_results_is_protocol_error() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        assert!(matches!(err, TallyError::Api(ApiError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_generate_missing_results_is_protocol_error() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        assert!(matches!(err, TallyError::Api(ApiError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_generate_model_not_supported() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{
                    "code": "model_not_supported",
                    "message": "Model 'acme/legacy' is not supported",
                }],
                "status_code": 404,
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(GenerationRequest::new("acme/legacy", "x"))
            .await
            .unwrap_err();

        match err {
            TallyError::Api(ApiError::ModelNotSupported { model, suggestions }) => {
                assert_eq!(model, "acme/legacy");
                assert!(suggestions.contains(&DEFAULT_MODEL.to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_no_service_instance() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "errors": [{
                    "code": "no_associated_service_instance_error",
                    "message": "No associated service instance",
                }],
            })))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        assert!(err.user_message().contains("Project 'proj-1'"));
        assert!(matches!(
            err,
            TallyError::Api(ApiError::NoServiceInstance { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_other_code_surfaces_raw_fields() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errors": [{
                    "code": "json_validation_error",
                    "message": "parameters.max_new_tokens must be positive",
                }],
            })))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        match err {
            TallyError::Api(ApiError::Generation {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("json_validation_error"));
                assert!(message.contains("max_new_tokens"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_unstructured_error_body() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        match err {
            TallyError::Api(ApiError::Generation {
                status,
                code,
                message,
            }) => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_empty_error_body_uses_reason() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        assert!(err.user_message().contains("Service Unavailable"));
    }

    #[tokio::test]
    async fn test_generate_unauthorized_invalidates_token() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "errors": [{"code": "authentication_token_expired", "message": "expired"}],
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let err = provider.generate(request()).await.unwrap_err();

        assert!(matches!(err, TallyError::Api(ApiError::Generation { status: 401, .. })));
        assert!(provider.tokens().cache().get().is_none());
    }

    #[tokio::test]
    async fn test_generate_timeout() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let provider = provider_with(
            &server,
            GenerationTarget::Project("proj-1".to_string()),
            Duration::from_millis(200),
        );
        let err = provider.generate(request()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_generate_auth_failure_skips_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ml/v1/text/generation"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server).generate(request()).await.unwrap_err();
        assert!(matches!(err, TallyError::Api(ApiError::Auth { .. })));
    }

    #[tokio::test]
    async fn test_warm_up_fetches_token() {
        let server = MockServer::start().await;
        mount_identity(&server).await;

        let provider = provider(&server);
        provider.warm_up().await.unwrap();
        assert_eq!(provider.tokens().cache().get().unwrap().token, "bearer-123");
    }
}
