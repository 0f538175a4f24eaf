//! 上游来源模块：定义异步分块来源 trait，以及用于测试和演示的脚本化来源。
//!
//! # Completion Source Module
//!
//! The provider's wire protocol lives behind [`CompletionSource`]. The
//! resilience layer only needs "open a stream for this request"; everything
//! HTTP-specific (auth, SSE parsing, retries inside the transport) belongs to
//! the implementation.
//!
//! [`ScriptedSource`] replays canned responses in order and is what the tests
//! and the demo binary run against.

use crate::types::{Completion, CompletionRequest, StreamChunk, UpstreamError};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Boxed chunk stream returned by a source.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Asynchronous upstream completion source.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Open a streaming completion. Errors here mean the request never started.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream>;

    /// Non-streamed completion. The default drains [`open_stream`](Self::open_stream).
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let mut stream = self.open_stream(request).await?;
        let mut completion = Completion::default();
        while let Some(chunk) = stream.next().await {
            completion.push(chunk?);
        }
        Ok(completion)
    }
}

/// One scripted event inside a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Chunk(StreamChunk),
    /// Fail the stream; nothing after it is emitted.
    Fail(UpstreamError),
    /// Never produce anything again.
    Stall,
}

/// One scripted response.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    Stream(Vec<ScriptStep>),
    /// Fail before any chunk is produced.
    RejectOpen(UpstreamError),
}

impl Script {
    /// Text deltas followed by a metadata record for `model`.
    pub fn reply(model: &str, deltas: &[&str]) -> Self {
        let mut steps: Vec<ScriptStep> = deltas
            .iter()
            .map(|d| ScriptStep::Chunk(StreamChunk::delta(*d)))
            .collect();
        let completion_tokens = deltas.len() as u32;
        steps.push(ScriptStep::Chunk(StreamChunk::metadata(
            crate::types::CompletionMetadata::new(model)
                .with_usage(crate::types::TokenUsage::new(10, completion_tokens))
                .with_finish_reason("stop"),
        )));
        Script::Stream(steps)
    }

    /// Some deltas, then a mid-stream failure.
    pub fn fail_after(deltas: &[&str], error: UpstreamError) -> Self {
        let mut steps: Vec<ScriptStep> = deltas
            .iter()
            .map(|d| ScriptStep::Chunk(StreamChunk::delta(*d)))
            .collect();
        steps.push(ScriptStep::Fail(error));
        Script::Stream(steps)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    scripts: VecDeque<Script>,
    requests: Vec<CompletionRequest>,
}

/// In-memory source replaying queued [`Script`]s, one per request.
///
/// Once the queue is empty the fallback script (if any) is served for every
/// further request; without one the request fails with a validation error.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    inner: Mutex<Recorded>,
    fallback: Option<Script>,
    chunk_delay: Duration,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next unanswered request.
    pub fn push(&self, script: Script) -> &Self {
        self.lock().scripts.push_back(script);
        self
    }

    /// Serve `script` whenever the queue runs dry.
    pub fn with_fallback(mut self, script: Script) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Sleep before each step, to make streams observably asynchronous.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock().scripts.len()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_script(&self, request: &CompletionRequest) -> Result<Script> {
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        inner
            .scripts
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| {
                Error::validation_with_context(
                    "no scripted response left",
                    ErrorContext::new()
                        .with_details(format!("request #{}", inner.requests.len()))
                        .with_source("scripted_source"),
                )
            })
    }
}

#[async_trait]
impl CompletionSource for ScriptedSource {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream> {
        let steps = match self.next_script(request)? {
            Script::RejectOpen(e) => {
                tracing::debug!(model = %request.model, error = %e, "scripted source rejected request");
                return Err(e.into());
            }
            Script::Stream(steps) => steps,
        };
        tracing::debug!(model = %request.model, steps = steps.len(), "scripted stream opened");

        let delay = self.chunk_delay;
        let stream = futures::stream::unfold(steps.into_iter(), move |mut steps| async move {
            let step = steps.next()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match step {
                ScriptStep::Chunk(chunk) => Some((Ok(chunk), steps)),
                ScriptStep::Fail(e) => Some((Err(e.into()), Vec::new().into_iter())),
                ScriptStep::Stall => futures::future::pending().await,
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures::TryStreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest::new("test-model", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn test_scripts_served_in_order() {
        let source = ScriptedSource::new();
        source
            .push(Script::reply("test-model", &["a", "b"]))
            .push(Script::RejectOpen(UpstreamError::ModelUnavailable { model_id: None }));

        let chunks: Vec<StreamChunk> = source
            .open_stream(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_delta(), Some("a"));

        let err = source.open_stream(&request()).await.err().unwrap();
        assert!(matches!(err, Error::Upstream(UpstreamError::ModelUnavailable { .. })));

        // Queue exhausted, no fallback.
        let err = source.open_stream(&request()).await.err().unwrap();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_ends_stream() {
        let source = ScriptedSource::new();
        source.push(Script::fail_after(
            &["partial"],
            UpstreamError::RateLimited { retry_after: None },
        ));
        let mut stream = source.open_stream(&request()).await.unwrap();
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_requests_are_recorded() {
        let source = ScriptedSource::new().with_fallback(Script::reply("m", &["x"]));
        let req = request().max_tokens(64);
        tokio_test::block_on(source.complete(&req)).unwrap();
        assert_eq!(source.requests(), vec![req]);
    }

    #[tokio::test]
    async fn test_default_complete_collects() {
        let source = ScriptedSource::new().with_fallback(Script::reply("m", &["Hel", "lo"]));
        let completion = source.complete(&request()).await.unwrap();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.usage().unwrap().completion_tokens, 2);
        assert_eq!(source.remaining(), 0);
    }
}
