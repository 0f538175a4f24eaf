//! 类型模块：定义消息、流式分块、用量元数据和上游错误等核心数据类型。
//!
//! # Types Module
//!
//! Plain data exchanged between the orchestrator, the upstream completion
//! source and the stream bridge. The resilience components treat chunk
//! payloads as opaque; only the [`CompletionCollector`](crate::bridge::CompletionCollector)
//! looks inside them.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and text content |
//! | [`CompletionRequest`] | Messages plus model identifier and sampling knobs |
//! | [`StreamChunk`] | Either a text delta or a metadata record |
//! | [`CompletionMetadata`] | Terminal record: model, token usage, latency |
//! | [`Completion`] | Collected answer of a non-streamed call |
//! | [`UpstreamError`] | Typed failures raised by the completion source |

pub mod chunk;
pub mod message;
pub mod upstream;

pub use chunk::{Completion, CompletionMetadata, StreamChunk, TokenUsage};
pub use message::{CompletionRequest, Message, MessageRole};
pub use upstream::UpstreamError;
