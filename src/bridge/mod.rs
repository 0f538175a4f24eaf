//! 流桥接模块：在独立线程上驱动异步分块生产者，并向同步消费者按序交付分块。
//!
//! # Stream Bridge Module
//!
//! A UI loop that renders chunks synchronously cannot drive an async stream
//! itself. The bridge runs the producer on a dedicated thread with its own
//! runtime and hands chunks over through a bounded FIFO queue.
//!
//! Guarantees:
//! - chunks arrive in exactly the order the producer emitted them
//! - a producer error is re-raised on the consumer thread after the chunks before it
//! - the consumer never blocks longer than [`BridgeConfig::chunk_timeout`] per chunk
//! - cancellation is cooperative: [`StreamBridge::stop`] is observed at the
//!   producer's next yield point
//!
//! ```rust
//! use neural_terminal::bridge::{BridgeConfig, StreamBridge};
//! use neural_terminal::Result;
//!
//! let producer = futures::stream::iter(vec![Ok::<_, neural_terminal::Error>(1), Ok(2), Ok(3)]);
//! let bridge = StreamBridge::spawn(producer, &BridgeConfig::default()).unwrap();
//! let chunks: Result<Vec<i32>> = bridge.collect();
//! assert_eq!(chunks.unwrap(), vec![1, 2, 3]);
//! ```

mod collector;
mod run;
mod worker;

pub use collector::CompletionCollector;
pub use run::run_async;
pub use worker::{StopHandle, StreamBridge};

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bound of the hand-off queue between producer and consumer.
    pub queue_capacity: usize,
    /// Longest the consumer waits for a single message.
    #[serde(with = "crate::utils::serde_secs")]
    pub chunk_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            chunk_timeout: Duration::from_secs(60),
        }
    }
}

impl BridgeConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::configuration_with_context(
                "queue_capacity must be positive",
                ErrorContext::new()
                    .with_field_path("bridge.queue_capacity")
                    .with_source("stream_bridge"),
            ));
        }
        if self.chunk_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "chunk_timeout must be positive",
                ErrorContext::new()
                    .with_field_path("bridge.chunk_timeout")
                    .with_source("stream_bridge"),
            ));
        }
        Ok(())
    }
}
