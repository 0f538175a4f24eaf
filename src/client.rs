//! 客户端模块：将限流器、熔断器与流桥接组合为面向编排层的补全客户端。
//!
//! Completion client for the chat orchestrator.
//!
//! Wires the three guards around a [`CompletionSource`](crate::source::CompletionSource)
//! in the fixed order: rate limiter, then circuit breaker, then stream bridge.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
mod core;
pub mod signals;
mod stream;

pub use builder::CompletionClientBuilder;
pub use core::CompletionClient;
pub use signals::{CostSnapshot, SignalsSnapshot};
pub use stream::GuardedStream;
