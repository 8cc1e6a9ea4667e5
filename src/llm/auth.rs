// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bearer token acquisition for the generation endpoint
//!
//! A long-lived API key is exchanged at the identity service for a
//! short-lived access token. Tokens are cached in a [`TokenCache`] until
//! shortly before they expire.
//!
//! Concurrent callers that find the cache expired may each refresh it. The
//! exchange is idempotent, so the last writer wins and no lock is held
//! across the network call.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};

pub const DEFAULT_IDENTITY_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const API_KEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Tokens are refreshed this many seconds before they actually expire
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the identity service omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(30);

/// A cached access token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Expiry as epoch seconds
    pub expires_at: i64,
}

impl AccessToken {
    /// Usable at `now` (epoch seconds), honouring the safety margin
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at - EXPIRY_MARGIN_SECS
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shareable handle to a cached access token.
///
/// Cloning the handle shares the underlying slot, so sessions that use the
/// same credential can reuse one token.
#[derive(Clone, Default, Debug)]
pub struct TokenCache {
    slot: Arc<RwLock<Option<AccessToken>>>,
}

impl TokenCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry, valid or not
    pub fn get(&self) -> Option<AccessToken> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Token string if the entry is still usable at `now`
    pub fn valid_token(&self, now: i64) -> Option<String> {
        self.get()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.token)
    }

    /// Replace the entry
    pub fn store(&self, token: AccessToken) {
        *self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
    }

    /// Drop the entry so the next request refreshes
    pub fn invalidate(&self) {
        *self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IdentityError {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Exchanges an API key for bearer tokens and caches them
pub struct TokenManager {
    client: Client,
    api_key: String,
    identity_url: String,
    cache: TokenCache,
}

impl TokenManager {
    /// Create a manager with a private cache and default endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(
            api_key,
            DEFAULT_IDENTITY_URL,
            TokenCache::new(),
            DEFAULT_IDENTITY_TIMEOUT,
        )
    }

    /// Create a manager with an explicit endpoint, cache handle and timeout
    pub fn with_options(
        api_key: impl Into<String>,
        identity_url: impl Into<String>,
        cache: TokenCache,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            identity_url: identity_url.into(),
            cache,
        })
    }

    /// The cache this manager reads and writes
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Return a usable bearer token, exchanging the API key if needed
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.cache.valid_token(Utc::now().timestamp()) {
            debug!("Using cached access token");
            return Ok(token);
        }

        info!(url = %self.identity_url, "Requesting new access token");
        let fresh = self.exchange().await.inspect_err(|e| {
            warn!(error = %e, "Access token exchange failed");
        })?;
        let token = fresh.token.clone();
        self.cache.store(fresh);
        Ok(token)
    }

    async fn exchange(&self) -> Result<AccessToken> {
        let response = self
            .client
            .post(&self.identity_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", API_KEY_GRANT_TYPE),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| match ApiError::from_transport("Identity", &e) {
                timeout @ ApiError::Timeout { .. } => timeout,
                _ => ApiError::Auth {
                    status: None,
                    message: format!("identity service unreachable: {e}"),
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<IdentityError>(&body)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or(body);
            return Err(ApiError::Auth {
                status: Some(status.as_u16()),
                message,
            }
            .into());
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Protocol(format!("invalid token response: {e}")))?;

        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now().timestamp() + expires_in,
        })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("identity_url", &self.identity_url)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer, cache: TokenCache) -> TokenManager {
        TokenManager::with_options(
            "test-key",
            format!("{}/identity/token", server.uri()),
            cache,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn token_body(token: &str, expires_in: i64) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })
    }

    #[test]
    fn test_access_token_margin() {
        let token = AccessToken {
            token: "t".to_string(),
            expires_at: 1_000,
        };
        assert!(token.is_valid_at(939));
        assert!(!token.is_valid_at(940));
        assert!(!token.is_valid_at(2_000));
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken {
            token: "secret-token".to_string(),
            expires_at: 1,
        };
        assert!(!format!("{:?}", token).contains("secret-token"));
    }

    #[test]
    fn test_cache_store_and_invalidate() {
        let cache = TokenCache::new();
        let shared = cache.clone();
        cache.store(AccessToken {
            token: "abc".to_string(),
            expires_at: Utc::now().timestamp() + 600,
        });
        assert_eq!(
            shared.valid_token(Utc::now().timestamp()).as_deref(),
            Some("abc")
        );

        shared.invalidate();
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn test_get_token_reuses_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains(
                "grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey",
            ))
            .and(body_string_contains("apikey=test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager(&server, TokenCache::new());
        assert_eq!(manager.get_token().await.unwrap(), "tok-1");
        assert_eq!(manager.get_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_get_token_refreshes_expired_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        cache.store(AccessToken {
            token: "stale".to_string(),
            expires_at: Utc::now().timestamp() - 10,
        });

        let manager = manager(&server, cache.clone());
        assert_eq!(manager.get_token().await.unwrap(), "fresh");
        assert_eq!(cache.get().unwrap().token, "fresh");
        assert!(cache.get().unwrap().expires_at > Utc::now().timestamp() + 3000);
    }

    #[tokio::test]
    async fn test_get_token_refreshes_inside_margin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        cache.store(AccessToken {
            token: "almost-stale".to_string(),
            expires_at: Utc::now().timestamp() + 30,
        });

        let manager = manager(&server, cache);
        assert_eq!(manager.get_token().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_get_token_defaults_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "no-expiry"})),
            )
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        let manager = manager(&server, cache.clone());
        let before = Utc::now().timestamp();
        manager.get_token().await.unwrap();

        let expires_at = cache.get().unwrap().expires_at;
        assert!(expires_at >= before + DEFAULT_EXPIRES_IN_SECS);
        assert!(expires_at <= Utc::now().timestamp() + DEFAULT_EXPIRES_IN_SECS);
    }

    #[tokio::test]
    async fn test_shared_cache_across_managers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("shared", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        let first = manager(&server, cache.clone());
        let second = manager(&server, cache);

        assert_eq!(first.get_token().await.unwrap(), "shared");
        assert_eq!(second.get_token().await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_get_token_rejected_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found.",
            })))
            .mount(&server)
            .await;

        let cache = TokenCache::new();
        let err = manager(&server, cache.clone()).get_token().await.unwrap_err();

        match err {
            TallyError::Api(ApiError::Auth { status, message }) => {
                assert_eq!(status, Some(400));
                assert!(message.contains("could not be found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn test_get_token_unreachable_is_auth_error() {
        let manager = TokenManager::with_options(
            "test-key",
            "http://127.0.0.1:1/identity/token",
            TokenCache::new(),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(
            err,
            TallyError::Api(ApiError::Auth { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_get_token_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("late", 3600))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let manager = TokenManager::with_options(
            "test-key",
            format!("{}/identity/token", server.uri()),
            TokenCache::new(),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = manager.get_token().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_get_token_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"nope": 1})))
            .mount(&server)
            .await;

        let err = manager(&server, TokenCache::new()).get_token().await.unwrap_err();
        assert!(matches!(err, TallyError::Api(ApiError::Protocol(_))));
    }
}
