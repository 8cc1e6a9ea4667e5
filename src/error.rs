// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Tally
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Tally operations
#[derive(Error, Debug)]
pub enum TallyError {
    /// Remote service errors (identity or generation endpoint)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Malformed conversation import payload
    #[error("Import error: {0}")]
    Import(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while talking to the identity or generation service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The API-key exchange was rejected or could not be completed
    #[error("Authentication failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// A network call exceeded its time bound
    #[error("{operation} request timed out")]
    Timeout { operation: String },

    /// The generation endpoint rejected the configured model
    #[error("Model '{model}' is not supported. Try one of: {}", .suggestions.join(", "))]
    ModelNotSupported {
        model: String,
        suggestions: Vec<String>,
    },

    /// The project or space is not associated with a service instance
    #[error("{target} is not associated with an active machine learning service instance")]
    NoServiceInstance { target: String },

    /// The generation endpoint returned a non-success status
    #[error("Generation failed ({status}{}): {message}", .code.as_ref().map(|c| format!(", {c}")).unwrap_or_default())]
    Generation {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The response did not have the expected shape
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// Connectivity failure other than a timeout
    #[error("Network error: {0}")]
    Network(String),
}

impl TallyError {
    /// Message suitable for showing to the person chatting.
    ///
    /// API errors are shown without the `API error:` wrapper since they
    /// already describe what went wrong.
    pub fn user_message(&self) -> String {
        match self {
            TallyError::Api(api) => api.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error came from a timed out network call
    pub fn is_timeout(&self) -> bool {
        matches!(self, TallyError::Api(ApiError::Timeout { .. }))
    }
}

impl ApiError {
    /// Map a transport failure into `Timeout` or `Network`
    pub fn from_transport(operation: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Result type alias for Tally operations
pub type Result<T> = std::result::Result<T, TallyError>;
