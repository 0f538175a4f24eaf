use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Upstream presumed unhealthy, calls rejected without reaching it
    Open,
    /// Recovery timeout elapsed, a single probe call is allowed
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub failure_count: u32,
    /// Remaining cooldown, if currently open.
    pub open_remaining: Option<Duration>,
    pub probe_in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "crate::utils::serde_secs")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::configuration_with_context(
                "failure_threshold must be positive",
                ErrorContext::new()
                    .with_field_path("circuit_breaker.failure_threshold")
                    .with_source("circuit_breaker"),
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "recovery_timeout must be positive",
                ErrorContext::new()
                    .with_field_path("circuit_breaker.recovery_timeout")
                    .with_source("circuit_breaker"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// Set while the half-open probe is outstanding.
    probe_started_at: Option<Instant>,
}

/// Three-state circuit breaker.
///
/// Guarded calls go through [`call`](Self::call) / [`call_async`](Self::call_async).
/// Streaming calls cannot report their outcome at a single call boundary, so they
/// use the split API instead: [`check_state`](Self::check_state) before opening the
/// stream, then exactly one of [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure) once the stream ends.
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                probe_started_at: None,
            }),
        })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit or reject a call. Moves Open to HalfOpen once the recovery timeout
    /// has elapsed, admitting the caller as the single probe.
    pub fn check_state(&self) -> Result<()> {
        let mut st = self.lock();
        let now = Instant::now();
        match st.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = st.opened_at.unwrap_or(now);
                let elapsed = now.duration_since(opened_at);
                if elapsed < self.cfg.recovery_timeout {
                    return Err(Error::CircuitBreakerOpen {
                        remaining: self.cfg.recovery_timeout - elapsed,
                    });
                }
                st.state = CircuitState::HalfOpen;
                st.probe_started_at = Some(now);
                tracing::info!(
                    failure_count = st.failure_count,
                    "circuit breaker half-open, admitting probe"
                );
                Ok(())
            }
            CircuitState::HalfOpen => match st.probe_started_at {
                Some(started) if now.duration_since(started) < self.cfg.recovery_timeout => {
                    Err(Error::CircuitBreakerOpen {
                        remaining: Duration::ZERO,
                    })
                }
                _ => {
                    // Previous probe never reported back; admit a new one.
                    tracing::debug!("replacing abandoned half-open probe");
                    st.probe_started_at = Some(now);
                    Ok(())
                }
            },
        }
    }

    /// Reset the failure streak; a HalfOpen probe success closes the breaker.
    ///
    /// A late success from a call admitted before the breaker opened does not
    /// cut the cooldown short.
    pub fn record_success(&self) {
        let mut st = self.lock();
        st.failure_count = 0;
        match st.state {
            CircuitState::Open => {
                tracing::debug!("late success while open, keeping cooldown");
            }
            CircuitState::HalfOpen => {
                st.state = CircuitState::Closed;
                st.opened_at = None;
                st.probe_started_at = None;
                tracing::info!("circuit breaker closed");
            }
            CircuitState::Closed => {}
        }
    }

    pub fn record_failure(&self) {
        let mut st = self.lock();
        st.failure_count = st.failure_count.saturating_add(1);
        match st.state {
            CircuitState::HalfOpen => {
                Self::open_locked(&mut st);
                tracing::warn!(
                    failure_count = st.failure_count,
                    "circuit breaker probe failed, reopening"
                );
            }
            CircuitState::Closed if st.failure_count >= self.cfg.failure_threshold => {
                Self::open_locked(&mut st);
                tracing::warn!(
                    failure_count = st.failure_count,
                    recovery_timeout_ms = self.cfg.recovery_timeout.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            // Late failure from a call admitted before the breaker opened:
            // keep the original cooldown.
            _ => {}
        }
    }

    fn open_locked(st: &mut State) {
        st.state = CircuitState::Open;
        st.opened_at = Some(Instant::now());
        st.probe_started_at = None;
    }

    /// Run `op` under breaker protection.
    ///
    /// The operation's own error is returned unchanged after being recorded.
    pub fn call<T, E, F>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.check_state()?;
        match op() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Async counterpart of [`call`](Self::call).
    ///
    /// Do not use this for streams: awaiting the future only opens the stream,
    /// it says nothing about how the stream ends.
    pub async fn call_async<T, E, F, Fut>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        self.check_state()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Current state as last recorded; Open is only left when a call is attempted.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Force the breaker closed. Administrative use only.
    /// Force the breaker back to Closed with a clean streak.
    pub fn reset(&self) {
        let mut st = self.lock();
        if st.state != CircuitState::Closed {
            tracing::info!("circuit breaker reset");
        }
        st.state = CircuitState::Closed;
        st.failure_count = 0;
        st.opened_at = None;
        st.probe_started_at = None;
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining = match (st.state, st.opened_at) {
            (CircuitState::Open, Some(opened_at)) => self
                .cfg
                .recovery_timeout
                .checked_sub(now.duration_since(opened_at)),
            _ => None,
        };
        CircuitBreakerSnapshot {
            state: st.state,
            failure_threshold: self.cfg.failure_threshold,
            recovery_timeout: self.cfg.recovery_timeout,
            failure_count: st.failure_count,
            open_remaining,
            probe_in_flight: st.state == CircuitState::HalfOpen && st.probe_started_at.is_some(),
        }
    }
}
