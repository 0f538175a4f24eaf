use super::ModelPricing;
use crate::types::TokenUsage;
use std::sync::{Mutex, MutexGuard};

/// Position of the accumulated spend relative to the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    WithinBudget,
    /// Past 80 % of the budget.
    ApproachingLimit,
    Exceeded,
}

#[derive(Debug)]
struct Ledger {
    pricing: Option<ModelPricing>,
    accumulated: f64,
}

/// Running cost total with an optional budget.
///
/// Without pricing every call costs zero; without a budget every status is
/// [`BudgetStatus::WithinBudget`].
#[derive(Debug)]
pub struct CostTracker {
    budget_limit: Option<f64>,
    ledger: Mutex<Ledger>,
}

const WARN_RATIO: f64 = 0.8;

impl CostTracker {
    pub fn new(pricing: Option<ModelPricing>, budget_limit: Option<f64>) -> Self {
        Self {
            budget_limit,
            ledger: Mutex::new(Ledger {
                pricing,
                accumulated: 0.0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch the price table used for subsequent records.
    pub fn set_pricing(&self, pricing: ModelPricing) {
        self.lock().pricing = Some(pricing);
    }

    pub fn budget_limit(&self) -> Option<f64> {
        self.budget_limit
    }

    /// Add the actual cost of a finished call.
    pub fn record(&self, usage: &TokenUsage) -> BudgetStatus {
        let (cost, total) = {
            let mut ledger = self.lock();
            let cost = ledger
                .pricing
                .as_ref()
                .map(|p| p.calculate_cost(usage).total_cost)
                .unwrap_or(0.0);
            ledger.accumulated += cost;
            (cost, ledger.accumulated)
        };
        let status = self.classify(total);
        tracing::debug!(
            cost,
            accumulated = total,
            total_tokens = usage.total_tokens,
            ?status,
            "recorded completion cost"
        );
        if status == BudgetStatus::Exceeded {
            tracing::warn!(accumulated = total, limit = ?self.budget_limit, "budget exceeded");
        }
        status
    }

    /// Budget status if `streamed_tokens` more completion tokens were billed now.
    /// Nothing is added to the total.
    pub fn check_projected(&self, streamed_tokens: u32) -> BudgetStatus {
        let projected = {
            let ledger = self.lock();
            let estimate = ledger
                .pricing
                .as_ref()
                .map(|p| p.estimate_completion(streamed_tokens))
                .unwrap_or(0.0);
            ledger.accumulated + estimate
        };
        self.classify(projected)
    }

    pub fn accumulated(&self) -> f64 {
        self.lock().accumulated
    }

    pub fn status(&self) -> BudgetStatus {
        self.classify(self.accumulated())
    }

    pub fn reset(&self) {
        self.lock().accumulated = 0.0;
    }

    fn classify(&self, amount: f64) -> BudgetStatus {
        match self.budget_limit {
            Some(limit) if amount > limit => BudgetStatus::Exceeded,
            Some(limit) if amount > limit * WARN_RATIO => BudgetStatus::ApproachingLimit,
            _ => BudgetStatus::WithinBudget,
        }
    }
}
