use crate::error_code::ErrorCode;
use crate::types::UpstreamError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "rate_limit.burst_size")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "rate_limiter", "stream_bridge")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the resilience layer.
///
/// Only `RateLimitExceeded` and `CircuitBreakerOpen` are raised by the guards
/// themselves; upstream failures travel through `Upstream` untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Rate limit exceeded. Retry after {:.1} seconds", .retry_after.as_secs_f64())]
    RateLimitExceeded { retry_after: Duration },

    #[error("Circuit is OPEN. Retry after {:.1} seconds", .remaining.as_secs_f64())]
    CircuitBreakerOpen { remaining: Duration },

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Stream produced nothing for {} ms", .waited.as_millis())]
    StreamTimeout { waited: Duration },

    #[error("Stream producer terminated without completing")]
    StreamInterrupted,

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Classify this error into the stable [`ErrorCode`] taxonomy.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_error(self)
    }

    /// Suggested wait before retrying, when the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after } => Some(*retry_after),
            Error::CircuitBreakerOpen { remaining } => Some(*remaining),
            Error::Upstream(UpstreamError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }

    /// Message safe to show to an end user; never includes internal state.
    pub fn user_message(&self) -> &'static str {
        self.code().user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "burst_size must be positive",
            ErrorContext::new()
                .with_field_path("rate_limit.burst_size")
                .with_source("rate_limiter"),
        );
        let text = err.to_string();
        assert!(text.contains("burst_size must be positive"));
        assert!(text.contains("field: rate_limit.burst_size"));
        assert!(text.contains("source: rate_limiter"));
        assert!(err.context().is_some());
    }

    #[test]
    fn test_retry_after_carried_by_guard_errors() {
        let err = Error::RateLimitExceeded {
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1500)));
        assert_eq!(err.to_string(), "Rate limit exceeded. Retry after 1.5 seconds");

        let err = Error::CircuitBreakerOpen {
            remaining: Duration::from_secs(12),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert!(Error::Cancelled.retry_after().is_none());
    }

    #[test]
    fn test_upstream_error_converts_unchanged() {
        let err: Error = UpstreamError::ModelUnavailable {
            model_id: Some("meta/llama-3.1-8b".into()),
        }
        .into();
        match err {
            Error::Upstream(UpstreamError::ModelUnavailable { model_id }) => {
                assert_eq!(model_id.as_deref(), Some("meta/llama-3.1-8b"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
