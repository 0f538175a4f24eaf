use crate::client::core::CompletionClient;
use crate::config::ResilienceConfig;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, RateLimiter};
use crate::source::CompletionSource;
use crate::tokens::CostTracker;
use crate::bridge::BridgeConfig;
use crate::Result;
use std::sync::Arc;

/// Builder for [`CompletionClient`].
///
/// The limiter and breaker are meant to be process-wide. Pass existing ones
/// with [`shared_rate_limiter`](Self::shared_rate_limiter) /
/// [`shared_circuit_breaker`](Self::shared_circuit_breaker) when several
/// clients talk to the same upstream; otherwise `build` creates fresh ones
/// from the configuration.
#[derive(Default)]
pub struct CompletionClientBuilder {
    config: ResilienceConfig,
    rate_limiter: Option<Arc<RateLimiter>>,
    breaker: Option<Arc<CircuitBreaker>>,
    cost: Option<Arc<CostTracker>>,
}

impl CompletionClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from defaults overridden by `NT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().config(ResilienceConfig::from_env()?))
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rate_limit(mut self, cfg: RateLimitConfig) -> Self {
        self.config.rate_limit = cfg;
        self
    }

    pub fn circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = cfg;
        self
    }

    pub fn bridge(mut self, cfg: BridgeConfig) -> Self {
        self.config.bridge = cfg;
        self
    }

    /// Use an existing limiter instead of building one; `rate_limit` settings are then ignored.
    pub fn shared_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Use an existing breaker instead of building one; `circuit_breaker` settings are then ignored.
    pub fn shared_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Record the usage of every completed call.
    pub fn cost_tracker(mut self, tracker: Arc<CostTracker>) -> Self {
        self.cost = Some(tracker);
        self
    }

    /// Build the client. Invalid configuration fails here, not on first use.
    pub fn build(self, source: Arc<dyn CompletionSource>) -> Result<CompletionClient> {
        self.config.bridge.validate()?;
        let rate_limiter = match self.rate_limiter {
            Some(rl) => rl,
            None => Arc::new(RateLimiter::new(self.config.rate_limit.clone())?),
        };
        let breaker = match self.breaker {
            Some(b) => b,
            None => Arc::new(CircuitBreaker::new(self.config.circuit_breaker.clone())?),
        };

        tracing::debug!(
            requests_per_minute = rate_limiter.config().requests_per_minute,
            burst = rate_limiter.config().burst_size,
            failure_threshold = breaker.config().failure_threshold,
            recovery_secs = breaker.config().recovery_timeout.as_secs_f64(),
            queue_capacity = self.config.bridge.queue_capacity,
            "completion client built"
        );

        Ok(CompletionClient {
            source,
            rate_limiter,
            breaker,
            bridge: self.config.bridge,
            cost: self.cost,
        })
    }
}
