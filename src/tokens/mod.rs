//! 成本跟踪模块：按模型价格计算调用成本，并跟踪累计花费与预算状态。
//!
//! # Cost Tracking Module
//!
//! Turns the [`TokenUsage`](crate::types::TokenUsage) reported in a stream's
//! metadata record into money, and keeps a running total against an optional
//! budget.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ModelPricing`] | Per-1k-token prompt and completion prices for one model |
//! | [`CostEstimate`] | Cost breakdown of a single call |
//! | [`CostTracker`] | Thread-safe accumulator with budget thresholds |
//! | [`BudgetStatus`] | Within budget, past 80 %, or exceeded |
//!
//! ## Example
//!
//! ```rust
//! use neural_terminal::tokens::{BudgetStatus, CostTracker, ModelPricing};
//! use neural_terminal::types::TokenUsage;
//!
//! let tracker = CostTracker::new(Some(ModelPricing::new("demo", 1.0, 2.0)), Some(0.01));
//! let status = tracker.record(&TokenUsage::new(4, 1));
//! assert_eq!(status, BudgetStatus::WithinBudget);
//! assert!((tracker.accumulated() - 0.006).abs() < 1e-12);
//! ```

mod cost;
mod pricing;

pub use cost::{BudgetStatus, CostTracker};
pub use pricing::{CostEstimate, ModelPricing};
