use crate::resilience::circuit_breaker::CircuitBreakerSnapshot;
use crate::resilience::rate_limiter::RateLimiterSnapshot;
use crate::tokens::BudgetStatus;

/// Point-in-time view of the client's guards, for status bars and health checks.
///
/// Facts only; deciding what to do with them is up to the caller.
#[derive(Debug, Clone)]
pub struct SignalsSnapshot {
    pub rate_limiter: RateLimiterSnapshot,
    pub circuit_breaker: CircuitBreakerSnapshot,
    /// Present when a cost tracker is attached.
    pub cost: Option<CostSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostSnapshot {
    pub accumulated: f64,
    pub budget_limit: Option<f64>,
    pub status: BudgetStatus,
}
