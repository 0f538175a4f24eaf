//! Model pricing and cost estimation.

use crate::types::TokenUsage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub prompt_cost_per_1k: f64,
    pub completion_cost_per_1k: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".into()
}

impl ModelPricing {
    pub fn new(model: &str, prompt: f64, completion: f64) -> Self {
        Self {
            model: model.into(),
            prompt_cost_per_1k: prompt,
            completion_cost_per_1k: completion,
            currency: default_currency(),
        }
    }

    pub fn calculate_cost(&self, usage: &TokenUsage) -> CostEstimate {
        let pc = (usage.prompt_tokens as f64 / 1000.0) * self.prompt_cost_per_1k;
        let cc = (usage.completion_tokens as f64 / 1000.0) * self.completion_cost_per_1k;
        CostEstimate {
            model: self.model.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            prompt_cost: pc,
            completion_cost: cc,
            total_cost: pc + cc,
            currency: self.currency.clone(),
        }
    }

    /// Rough cost of `tokens` completion tokens, used while a stream is still running.
    pub fn estimate_completion(&self, tokens: u32) -> f64 {
        (tokens as f64 / 1000.0) * self.completion_cost_per_1k
    }

    pub fn llama_31_8b() -> Self {
        Self::new("meta/llama-3.1-8b-instruct", 0.0003, 0.0003)
    }
    pub fn llama_31_70b() -> Self {
        Self::new("meta/llama-3.1-70b-instruct", 0.00088, 0.00088)
    }
    pub fn gpt_4o_mini() -> Self {
        Self::new("openai/gpt-4o-mini", 0.00015, 0.0006)
    }
    pub fn claude_35_sonnet() -> Self {
        Self::new("anthropic/claude-3.5-sonnet", 0.003, 0.015)
    }

    /// Built-in price table lookup by (case-insensitive) model substring.
    pub fn for_model(model: &str) -> Option<Self> {
        let m = model.to_lowercase();
        if m.contains("llama-3.1-8b") {
            Some(Self::llama_31_8b())
        } else if m.contains("llama-3.1-70b") {
            Some(Self::llama_31_70b())
        } else if m.contains("gpt-4o-mini") {
            Some(Self::gpt_4o_mini())
        } else if m.contains("claude-3.5-sonnet") || m.contains("claude-3-5-sonnet") {
            Some(Self::claude_35_sonnet())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub prompt_cost: f64,
    pub completion_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

impl CostEstimate {
    pub fn format(&self) -> String {
        format!("{} {:.6}", self.currency, self.total_cost)
    }
    pub fn format_detailed(&self) -> String {
        if self.total_cost < 0.01 {
            format!("{:.4}¢", self.total_cost * 100.0)
        } else {
            format!("${:.4}", self.total_cost)
        }
    }
}
