use crate::bridge::{StopHandle, StreamBridge};
use crate::resilience::CircuitBreaker;
use crate::tokens::{BudgetStatus, CostTracker};
use crate::types::StreamChunk;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Generated tokens between two projected-budget checks.
const BUDGET_CHECK_INTERVAL: u32 = 100;

/// A bridged completion stream that reports its outcome to the circuit breaker.
///
/// Exactly one outcome is reported per stream:
/// - completion records a success
/// - any error except [`Error::Cancelled`] records a failure
/// - cancellation, or dropping the stream early, records nothing
///
/// With a cost tracker attached, every delta is counted as one generated token
/// and the projected spend is checked every 100 of them; the final usage record
/// replaces the projection with the billed amount.
pub struct GuardedStream {
    bridge: StreamBridge<StreamChunk>,
    breaker: Arc<CircuitBreaker>,
    cost: Option<Arc<CostTracker>>,
    model: String,
    started: Instant,
    reported: bool,
    streamed_tokens: u32,
    budget_status: Option<BudgetStatus>,
}

impl GuardedStream {
    pub(crate) fn new(
        bridge: StreamBridge<StreamChunk>,
        breaker: Arc<CircuitBreaker>,
        cost: Option<Arc<CostTracker>>,
        model: String,
    ) -> Self {
        Self {
            bridge,
            breaker,
            cost,
            model,
            started: Instant::now(),
            reported: false,
            streamed_tokens: 0,
            budget_status: None,
        }
    }

    /// Next chunk, blocking for at most the bridge's chunk timeout.
    pub fn next_chunk(&mut self) -> Result<Option<StreamChunk>> {
        match self.bridge.next_chunk() {
            Ok(Some(chunk)) => {
                self.track_cost(&chunk);
                Ok(Some(chunk))
            }
            Ok(None) => {
                if !self.reported {
                    self.reported = true;
                    self.breaker.record_success();
                    tracing::debug!(
                        bridge_id = %self.bridge.id(),
                        model = %self.model,
                        chunks = self.bridge.chunks_forwarded(),
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        "stream completed"
                    );
                }
                Ok(None)
            }
            Err(e) => {
                self.report_error(&e);
                Err(e)
            }
        }
    }

    fn track_cost(&mut self, chunk: &StreamChunk) {
        let Some(cost) = &self.cost else {
            return;
        };
        match chunk {
            StreamChunk::Delta { .. } => {
                self.streamed_tokens = self.streamed_tokens.saturating_add(1);
                if self.streamed_tokens % BUDGET_CHECK_INTERVAL != 0 {
                    return;
                }
                let status = cost.check_projected(self.streamed_tokens);
                if status != BudgetStatus::WithinBudget
                    && self.budget_status != Some(status)
                {
                    tracing::warn!(
                        bridge_id = %self.bridge.id(),
                        model = %self.model,
                        streamed_tokens = self.streamed_tokens,
                        ?status,
                        "projected spend nearing budget"
                    );
                }
                self.budget_status = Some(status);
            }
            StreamChunk::Metadata(meta) => {
                if let Some(usage) = &meta.usage {
                    self.budget_status = Some(cost.record(usage));
                }
            }
        }
    }

    fn report_error(&mut self, e: &Error) {
        if self.reported {
            return;
        }
        self.reported = true;
        let code = e.code();
        if code.counts_as_upstream_failure() {
            self.breaker.record_failure();
            tracing::warn!(
                bridge_id = %self.bridge.id(),
                model = %self.model,
                code = %code,
                error = %crate::logging::redact_secrets(&e.to_string()),
                "stream failed"
            );
        } else {
            tracing::info!(bridge_id = %self.bridge.id(), code = %code, "stream ended without breaker report");
        }
    }

    /// Ask the producer to stop. After any chunks already queued, the stream
    /// ends with [`Error::Cancelled`].
    pub fn stop(&self) {
        self.bridge.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.bridge.stop_handle()
    }

    pub fn id(&self) -> Uuid {
        self.bridge.id()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn chunks_forwarded(&self) -> u64 {
        self.bridge.chunks_forwarded()
    }

    /// Latest budget status seen by this stream: a projection while
    /// streaming, the billed status once usage arrived. `None` without a
    /// cost tracker or before the first check.
    pub fn budget_status(&self) -> Option<BudgetStatus> {
        self.budget_status
    }

    /// True once a terminal result has been returned.
    pub fn is_finished(&self) -> bool {
        self.bridge.is_finished()
    }
}

impl Iterator for GuardedStream {
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
