//! Typed failures raised by an upstream completion source.

use std::time::Duration;
use thiserror::Error;

/// Errors the circuit breaker treats as upstream failure signals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// HTTP 429 from the provider (distinct from the local rate limiter).
    #[error("Upstream rate limit exceeded{}", fmt_retry(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 503 for the requested model.
    #[error("Model temporarily unavailable{}", fmt_model(.model_id))]
    ModelUnavailable { model_id: Option<String> },

    /// Context exceeds the model's token limit.
    #[error("Context too long{}", fmt_tokens(.max_tokens, .actual_tokens))]
    TokenLimit {
        max_tokens: Option<u32>,
        actual_tokens: Option<u32>,
    },

    #[error("HTTP {status}: {message}")]
    Api {
        status: u16,
        message: String,
        /// Raw response body, kept for debugging; redact before logging.
        body: Option<String>,
    },
}

fn fmt_retry(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

fn fmt_model(model_id: &Option<String>) -> String {
    model_id
        .as_ref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

fn fmt_tokens(max: &Option<u32>, actual: &Option<u32>) -> String {
    match (max, actual) {
        (Some(max), Some(actual)) => format!(" ({} > {})", actual, max),
        (Some(max), None) => format!(" (max {})", max),
        _ => String::new(),
    }
}

impl UpstreamError {
    /// HTTP status this error corresponds to.
    pub fn status(&self) -> u16 {
        match self {
            UpstreamError::RateLimited { .. } => 429,
            UpstreamError::ModelUnavailable { .. } => 503,
            UpstreamError::TokenLimit { .. } => 400,
            UpstreamError::Api { status, .. } => *status,
        }
    }

    /// Build the typed variant for a provider HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        match status {
            429 => UpstreamError::RateLimited { retry_after: None },
            503 => UpstreamError::ModelUnavailable { model_id: None },
            _ => UpstreamError::Api {
                status,
                message: message.into(),
                body,
            },
        }
    }
}
