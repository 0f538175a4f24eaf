//! 弹性模式模块：提供令牌桶限流器和三态熔断器。
//!
//! # Resilience Primitives Module
//!
//! Guards placed in front of the upstream completion API. Both are created once
//! per process, shared behind an `Arc`, and mutate their state only through
//! their own methods under a single internal lock.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Fail-fast token bucket bounding outbound request rate |
//! | [`circuit_breaker`] | Closed / Open / HalfOpen breaker with a single recovery probe |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Failures reached the threshold, requests fail fast
//! - **Half-Open**: Recovery timeout elapsed, one probe tests the upstream
//!
//! ```rust
//! use neural_terminal::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(5)
//!     .with_recovery_timeout(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new(config).unwrap();
//!
//! // Streaming calls use the split API.
//! if breaker.check_state().is_ok() {
//!     // ... consume the stream ...
//!     breaker.record_success();
//! }
//! ```
//!
//! ## Rate Limiter
//!
//! ```rust
//! use neural_terminal::resilience::rate_limiter::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(RateLimitConfig::new(20, 5).unwrap()).unwrap();
//! match limiter.acquire() {
//!     Ok(()) => { /* send the request */ }
//!     Err(e) => println!("slow down: {}", e),
//! }
//! ```

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use rate_limiter::{RateLimitConfig, RateLimiter, RateLimiterSnapshot};
