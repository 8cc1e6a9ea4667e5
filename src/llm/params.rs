// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation parameters and their sanitization
//!
//! Parameters frequently come from loosely typed UI configuration, so every
//! value is clamped into the range the generation endpoint accepts and
//! anything unusable falls back to the default instead of failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;
pub const MAX_NEW_TOKENS_LIMIT: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_TOP_K: u32 = 50;
pub const DEFAULT_REPETITION_PENALTY: f64 = 1.0;
pub const MAX_STOP_SEQUENCES: usize = 5;

/// Sampling strategy sent to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

/// Sampling knobs for a generation request, serialized as the `parameters`
/// object of the request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub decoding_method: DecodingMethod,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repetition_penalty: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            decoding_method: DecodingMethod::Sample,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            min_new_tokens: 0,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            repetition_penalty: DEFAULT_REPETITION_PENALTY,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationParams {
    /// Clamp an already typed parameter set
    pub fn sanitized(&self) -> Self {
        let max_new_tokens = clamp_max_new_tokens(Some(self.max_new_tokens as f64));
        let temperature = clamp_f64(Some(self.temperature), 0.0, 2.0, DEFAULT_TEMPERATURE);
        Self {
            decoding_method: decoding_for(temperature),
            max_new_tokens,
            min_new_tokens: self.min_new_tokens.min(max_new_tokens),
            temperature,
            top_p: clamp_f64(Some(self.top_p), 0.0, 1.0, DEFAULT_TOP_P),
            top_k: self.top_k.max(1),
            repetition_penalty: clamp_f64(
                Some(self.repetition_penalty),
                1.0,
                2.0,
                DEFAULT_REPETITION_PENALTY,
            ),
            stop_sequences: self
                .stop_sequences
                .iter()
                .take(MAX_STOP_SEQUENCES)
                .cloned()
                .collect(),
        }
    }
}

/// Build a valid parameter set from an arbitrary JSON object.
///
/// Numbers may arrive as JSON numbers or numeric strings. Missing or
/// non-numeric values take the defaults. `decoding_method` always follows
/// the clamped temperature.
pub fn sanitize_params(raw: &Value) -> GenerationParams {
    let max_new_tokens = clamp_max_new_tokens(number(raw, "max_new_tokens"));
    let temperature = clamp_f64(number(raw, "temperature"), 0.0, 2.0, DEFAULT_TEMPERATURE);

    let min_new_tokens = number(raw, "min_new_tokens")
        .map(|n| n.round().clamp(0.0, max_new_tokens as f64) as u32)
        .unwrap_or(0);

    let top_k = number(raw, "top_k")
        .map(|n| n.round().clamp(1.0, u32::MAX as f64) as u32)
        .unwrap_or(DEFAULT_TOP_K);

    let stop_sequences = raw
        .get("stop_sequences")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .take(MAX_STOP_SEQUENCES)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    GenerationParams {
        decoding_method: decoding_for(temperature),
        max_new_tokens,
        min_new_tokens,
        temperature,
        top_p: clamp_f64(number(raw, "top_p"), 0.0, 1.0, DEFAULT_TOP_P),
        top_k,
        repetition_penalty: clamp_f64(
            number(raw, "repetition_penalty"),
            1.0,
            2.0,
            DEFAULT_REPETITION_PENALTY,
        ),
        stop_sequences,
    }
}

/// Serde hook for parameter sets read from user-edited files
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<GenerationParams, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(sanitize_params(&raw))
}

fn decoding_for(temperature: f64) -> DecodingMethod {
    if temperature == 0.0 {
        DecodingMethod::Greedy
    } else {
        DecodingMethod::Sample
    }
}

fn number(raw: &Value, key: &str) -> Option<f64> {
    let value = raw.get(key)?;
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn clamp_f64(value: Option<f64>, min: f64, max: f64, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => default,
    }
}

fn clamp_max_new_tokens(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(1.0, MAX_NEW_TOKENS_LIMIT as f64) as u32,
        _ => DEFAULT_MAX_NEW_TOKENS,
    }
}
