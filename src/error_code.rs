//! 错误码：将运行时错误归类为稳定的机器码、严重级别和面向用户的提示。
//!
//! Stable error codes for the resilience layer.
//!
//! Every [`Error`](crate::Error) maps to exactly one [`ErrorCode`]. The code
//! carries the metadata an orchestrator needs to react without matching on
//! error internals:
//!
//! | Code                  | Severity | Breaker failure |
//! |-----------------------|----------|-----------------|
//! | `RATE_LIMIT_EXCEEDED` | warning  | no              |
//! | `CIRCUIT_OPEN`        | info     | no              |
//! | `HTTP_429`            | warning  | yes             |
//! | `HTTP_503`            | error    | yes             |
//! | `TOKEN_LIMIT`         | warning  | yes             |
//! | `HTTP_401`            | critical | yes             |
//! | `API_ERROR`           | error    | yes             |
//! | `STREAM_TIMEOUT`      | error    | yes             |
//! | `STREAM_INTERRUPTED`  | error    | yes             |
//! | `CANCELLED`           | info     | no              |
//! | `CONFIGURATION`       | critical | yes             |
//! | `VALIDATION`          | error    | yes             |
//! | `INTERNAL`            | error    | yes             |
//!
//! Only the two guard rejections and cancellation are exempt: anything else
//! that ends a stream is reported to the breaker.
//!
//! ## Example
//!
//! ```rust
//! use neural_terminal::error_code::ErrorCode;
//!
//! let code = ErrorCode::from_http_status(503);
//! assert_eq!(code.code(), "HTTP_503");
//! assert!(code.counts_as_upstream_failure());
//! ```

use crate::types::UpstreamError;
use crate::Error;
use std::fmt;

/// How loudly an error should be surfaced to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Client-side token bucket is empty
    RateLimitExceeded,
    /// Circuit breaker rejected the call without reaching upstream
    CircuitOpen,
    /// Upstream answered 429
    UpstreamRateLimited,
    /// Upstream answered 503 for the requested model
    ModelUnavailable,
    /// Conversation exceeds the model's context window
    TokenLimit,
    /// Upstream rejected the credentials
    Authentication,
    /// Any other upstream API failure
    ApiError,
    /// Stream bridge waited too long for the producer
    StreamTimeout,
    /// Stream producer died without a terminal message
    StreamInterrupted,
    /// Stream stopped by the consumer
    Cancelled,
    Configuration,
    Validation,
    Internal,
}

impl ErrorCode {
    /// Returns the machine-readable code string (e.g., `"CIRCUIT_OPEN"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::UpstreamRateLimited => "HTTP_429",
            Self::ModelUnavailable => "HTTP_503",
            Self::TokenLimit => "TOKEN_LIMIT",
            Self::Authentication => "HTTP_401",
            Self::ApiError => "API_ERROR",
            Self::StreamTimeout => "STREAM_TIMEOUT",
            Self::StreamInterrupted => "STREAM_INTERRUPTED",
            Self::Cancelled => "CANCELLED",
            Self::Configuration => "CONFIGURATION",
            Self::Validation => "VALIDATION",
            Self::Internal => "INTERNAL",
        }
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        match self {
            Self::CircuitOpen | Self::Cancelled => Severity::Info,
            Self::RateLimitExceeded | Self::UpstreamRateLimited | Self::TokenLimit => {
                Severity::Warning
            }
            Self::Authentication | Self::Configuration => Severity::Critical,
            Self::ModelUnavailable
            | Self::ApiError
            | Self::StreamTimeout
            | Self::StreamInterrupted
            | Self::Validation
            | Self::Internal => Severity::Error,
        }
    }

    /// Whether an error with this code should be recorded as a circuit breaker failure
    /// when it ends a streaming call.
    #[inline]
    pub fn counts_as_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited
                | Self::ModelUnavailable
                | Self::TokenLimit
                | Self::Authentication
                | Self::ApiError
                | Self::StreamTimeout
                | Self::StreamInterrupted
                | Self::Configuration
                | Self::Validation
                | Self::Internal
        )
    }

    /// User-facing text. Never includes internal state or upstream bodies.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded => {
                "Please wait a moment before sending more messages."
            }
            Self::CircuitOpen => {
                "Service temporarily unavailable. Please wait a moment and try again."
            }
            Self::UpstreamRateLimited => {
                "Rate limit exceeded. Please wait a moment before sending more messages."
            }
            Self::ModelUnavailable => {
                "The selected AI model is currently unavailable. Please try another model."
            }
            Self::TokenLimit => {
                "Message too long. Please shorten your message or start a new conversation."
            }
            Self::Authentication => "Authentication failed. Please check your API key in settings.",
            Self::ApiError | Self::StreamTimeout | Self::StreamInterrupted | Self::Internal => {
                "The response could not be completed. Please try again."
            }
            Self::Cancelled => "Response stopped.",
            Self::Configuration => "The application is misconfigured. Please check your settings.",
            Self::Validation => "The request was invalid.",
        }
    }

    /// Classify a crate error.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::RateLimitExceeded { .. } => Self::RateLimitExceeded,
            Error::CircuitBreakerOpen { .. } => Self::CircuitOpen,
            Error::Upstream(up) => Self::from_upstream(up),
            Error::StreamTimeout { .. } => Self::StreamTimeout,
            Error::StreamInterrupted => Self::StreamInterrupted,
            Error::Cancelled => Self::Cancelled,
            Error::Configuration { .. } | Error::Serialization(_) => Self::Configuration,
            Error::Validation { .. } => Self::Validation,
            Error::Runtime { .. } | Error::Io(_) => Self::Internal,
        }
    }

    pub fn from_upstream(err: &UpstreamError) -> Self {
        match err {
            UpstreamError::RateLimited { .. } => Self::UpstreamRateLimited,
            UpstreamError::ModelUnavailable { .. } => Self::ModelUnavailable,
            UpstreamError::TokenLimit { .. } => Self::TokenLimit,
            UpstreamError::Api { status, .. } => Self::from_http_status(*status),
        }
    }

    /// Maps an upstream HTTP status to the most likely code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::UpstreamRateLimited,
            503 => Self::ModelUnavailable,
            _ => Self::ApiError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
