//! Stream chunks produced by a completion source.

use serde::{Deserialize, Serialize};

/// One unit emitted by the upstream stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Partial assistant text
    Delta { text: String },
    /// Usage/latency record, normally the last chunk of a stream
    Metadata(CompletionMetadata),
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamChunk::Delta { text: text.into() }
    }

    pub fn metadata(meta: CompletionMetadata) -> Self {
        StreamChunk::Metadata(meta)
    }

    pub fn as_delta(&self) -> Option<&str> {
        match self {
            StreamChunk::Delta { text } => Some(text),
            StreamChunk::Metadata(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetadata {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl CompletionMetadata {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}

/// A fully collected, non-streamed answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CompletionMetadata>,
}

impl Completion {
    /// Apply one chunk: deltas append text, metadata replaces the last record.
    pub fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::Delta { text } => self.content.push_str(&text),
            StreamChunk::Metadata(meta) => self.metadata = Some(meta),
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.metadata.as_ref().and_then(|m| m.usage)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}
