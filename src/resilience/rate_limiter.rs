use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub tokens: f64,
    /// Estimated wait until a token is available, if currently empty.
    pub estimated_wait: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained rate; refill is `requests_per_minute / 60` tokens per second.
    pub requests_per_minute: u32,
    /// Bucket capacity.
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// Create a validated config.
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Result<Self> {
        let cfg = Self {
            requests_per_minute,
            burst_size,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(Error::configuration_with_context(
                "requests_per_minute must be positive",
                ErrorContext::new()
                    .with_field_path("rate_limit.requests_per_minute")
                    .with_source("rate_limiter"),
            ));
        }
        if self.burst_size == 0 {
            return Err(Error::configuration_with_context(
                "burst_size must be positive",
                ErrorContext::new()
                    .with_field_path("rate_limit.burst_size")
                    .with_source("rate_limiter"),
            ));
        }
        Ok(())
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    /// Set the sustained rate
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    /// Set the bucket capacity
    pub fn with_burst_size(mut self, burst: u32) -> Self {
        self.burst_size = burst;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 20,
            burst_size: 5,
        }
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
}

/// Token-bucket rate limiter with fail-fast acquisition.
///
/// - `acquire` never sleeps; an empty bucket is an error carrying the wait time
/// - refill is lazy, computed under the lock on every access
/// - one lock, so refill and decrement form a single critical section
pub struct RateLimiter {
    cfg: RateLimitConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Result<Self> {
        cfg.validate()?;
        let state = Mutex::new(State {
            tokens: cfg.burst_size as f64,
            last: Instant::now(),
        });
        Ok(Self { cfg, state })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.cfg
    }

    // State is plain arithmetic, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refill_locked(cfg: &RateLimitConfig, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * cfg.refill_rate()).min(cfg.burst_size as f64);
            st.last = now;
        }
    }

    fn wait_locked(cfg: &RateLimitConfig, st: &State) -> Duration {
        if st.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let missing = 1.0 - st.tokens;
        Duration::from_secs_f64(missing / cfg.refill_rate())
    }

    /// Take one token or fail with [`Error::RateLimitExceeded`].
    pub fn acquire(&self) -> Result<()> {
        let mut st = self.lock();
        Self::refill_locked(&self.cfg, &mut st);
        if st.tokens < 1.0 {
            let retry_after = Self::wait_locked(&self.cfg, &st);
            tracing::debug!(
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            return Err(Error::RateLimitExceeded { retry_after });
        }
        st.tokens -= 1.0;
        Ok(())
    }

    /// Try to acquire a token without failing, returns true if successful
    pub fn try_acquire(&self) -> bool {
        let mut st = self.lock();
        Self::refill_locked(&self.cfg, &mut st);
        if st.tokens >= 1.0 {
            st.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token, zero if one is available now.
    pub fn wait_time(&self) -> Duration {
        let mut st = self.lock();
        Self::refill_locked(&self.cfg, &mut st);
        Self::wait_locked(&self.cfg, &st)
    }

    /// Whole tokens currently available.
    pub fn available_tokens(&self) -> u32 {
        let mut st = self.lock();
        Self::refill_locked(&self.cfg, &mut st);
        st.tokens.floor() as u32
    }

    /// Refill to capacity. Administrative use only.
    pub fn reset(&self) {
        let mut st = self.lock();
        st.tokens = self.cfg.burst_size as f64;
        st.last = Instant::now();
    }

    /// Acquire one token, sleeping until one is available.
    pub async fn until_ready(&self) {
        loop {
            let wait = {
                let mut st = self.lock();
                Self::refill_locked(&self.cfg, &mut st);
                if st.tokens >= 1.0 {
                    st.tokens -= 1.0;
                    return;
                }
                Self::wait_locked(&self.cfg, &st)
            };
            // Never spin on sub-millisecond waits.
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.lock();
        Self::refill_locked(&self.cfg, &mut st);
        let wait = Self::wait_locked(&self.cfg, &st);
        RateLimiterSnapshot {
            requests_per_minute: self.cfg.requests_per_minute,
            burst: self.cfg.burst_size,
            tokens: st.tokens,
            estimated_wait: (!wait.is_zero()).then_some(wait),
        }
    }
}
