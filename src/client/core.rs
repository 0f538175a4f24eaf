use crate::bridge::{run_async, BridgeConfig, StreamBridge};
use crate::client::builder::CompletionClientBuilder;
use crate::client::signals::{CostSnapshot, SignalsSnapshot};
use crate::client::stream::GuardedStream;
use crate::resilience::{CircuitBreaker, RateLimiter};
use crate::source::CompletionSource;
use crate::tokens::CostTracker;
use crate::types::{Completion, CompletionRequest};
use crate::Result;
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Guarded entry point for chat completions.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct CompletionClient {
    pub(crate) source: Arc<dyn CompletionSource>,
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) bridge: BridgeConfig,
    pub(crate) cost: Option<Arc<CostTracker>>,
}

impl CompletionClient {
    pub fn builder() -> CompletionClientBuilder {
        CompletionClientBuilder::new()
    }

    /// Per-call gates, in order: one limiter token, then breaker admission.
    fn preflight(&self) -> Result<()> {
        self.rate_limiter.acquire()?;
        self.breaker.check_state()?;
        Ok(())
    }

    /// Start a streaming completion.
    ///
    /// Fails fast with `RateLimitExceeded` or `CircuitBreakerOpen` before the
    /// upstream is touched. Errors opening the upstream stream surface from the
    /// first [`GuardedStream::next_chunk`] call, and count against the breaker.
    pub fn stream_chat(&self, request: CompletionRequest) -> Result<GuardedStream> {
        self.preflight()?;

        let model = request.model.clone();
        let source = Arc::clone(&self.source);
        let producer =
            futures::stream::once(async move { source.open_stream(&request).await }).try_flatten();
        let bridge = StreamBridge::spawn(producer, &self.bridge)?;
        tracing::debug!(bridge_id = %bridge.id(), model = %model, "streaming completion started");

        Ok(GuardedStream::new(
            bridge,
            Arc::clone(&self.breaker),
            self.cost.clone(),
            model,
        ))
    }

    /// Non-streamed completion, guarded by [`CircuitBreaker::call_async`].
    ///
    /// Blocks the calling thread; safe to call from inside a runtime.
    pub fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.rate_limiter.acquire()?;
        let source = Arc::clone(&self.source);
        let breaker = Arc::clone(&self.breaker);
        let request = request.clone();
        let started = Instant::now();

        let completion = run_async(async move {
            breaker.call_async(|| source.complete(&request)).await
        })??;

        tracing::debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            chars = completion.content.len(),
            "completion finished"
        );
        if let (Some(cost), Some(usage)) = (&self.cost, completion.usage()) {
            cost.record(&usage);
        }
        Ok(completion)
    }

    pub fn signals(&self) -> SignalsSnapshot {
        SignalsSnapshot {
            rate_limiter: self.rate_limiter.snapshot(),
            circuit_breaker: self.breaker.snapshot(),
            cost: self.cost.as_ref().map(|c| CostSnapshot {
                accumulated: c.accumulated(),
                budget_limit: c.budget_limit(),
                status: c.status(),
            }),
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn bridge_config(&self) -> &BridgeConfig {
        &self.bridge
    }

    pub fn cost_tracker(&self) -> Option<&Arc<CostTracker>> {
        self.cost.as_ref()
    }
}
