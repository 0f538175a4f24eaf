//! # neural-terminal
//!
//! 流式补全弹性层：令牌桶限流、三态熔断，以及从异步生产者到同步消费者的流桥接。
//!
//! Resilience core of a chat front-end that proxies streaming chat completions
//! to a hosted LLM API. It sits between a synchronous UI loop and an
//! asynchronous upstream completion source.
//!
//! ## Components
//!
//! - **Rate limiting**: [`RateLimiter`] bounds outbound request rate with a fail-fast token bucket
//! - **Circuit breaking**: [`CircuitBreaker`] stops calling an unhealthy upstream and probes its recovery
//! - **Stream bridging**: [`StreamBridge`] delivers chunks from an async producer to synchronous code, in order
//! - **Composition**: [`CompletionClient`] applies all three around a [`CompletionSource`]
//!
//! ## Control flow
//!
//! ```text
//! acquire() ──► check_state() ──► open_stream ──► StreamBridge ──► consumer loop
//!                                                      │
//!                      record_success / record_failure ◄┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use neural_terminal::source::{Script, ScriptedSource};
//! use neural_terminal::{CompletionClient, CompletionRequest, Message, StreamChunk};
//! use std::sync::Arc;
//!
//! # fn main() -> neural_terminal::Result<()> {
//! let source = ScriptedSource::new().with_fallback(Script::reply("demo-model", &["Hello", ", world"]));
//! let client = CompletionClient::builder().build(Arc::new(source))?;
//!
//! let request = CompletionRequest::new("demo-model", vec![Message::user("Hi!")]);
//! let mut answer = String::new();
//! for chunk in client.stream_chat(request)? {
//!     if let StreamChunk::Delta { text } = chunk? {
//!         answer.push_str(&text);
//!     }
//! }
//! assert_eq!(answer, "Hello, world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Rate limiter and circuit breaker |
//! | [`bridge`] | Async-to-sync stream bridge, `run_async`, completion collector |
//! | [`client`] | Guarded completion client and builder |
//! | [`source`] | Upstream completion source trait and scripted source |
//! | [`types`] | Messages, chunks, usage metadata, upstream errors |
//! | [`config`] | Aggregate configuration from YAML and environment |
//! | [`tokens`] | Pricing and budget tracking |
//! | [`logging`] | Subscriber setup and secret redaction |

pub mod bridge;
pub mod client;
pub mod config;
pub mod error_code;
pub mod logging;
pub mod resilience;
pub mod source;
pub mod tokens;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use bridge::{run_async, BridgeConfig, CompletionCollector, StopHandle, StreamBridge};
pub use client::{CompletionClient, CompletionClientBuilder, GuardedStream, SignalsSnapshot};
pub use config::ResilienceConfig;
pub use error_code::{ErrorCode, Severity};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RateLimitConfig, RateLimiter,
};
pub use source::{ChunkStream, CompletionSource};
pub use types::{
    Completion, CompletionMetadata, CompletionRequest, Message, MessageRole, StreamChunk,
    TokenUsage, UpstreamError,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
