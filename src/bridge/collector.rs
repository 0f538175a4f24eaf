use crate::types::{CompletionMetadata, StreamChunk};
use crate::Result;

/// Accumulates a chat completion from a chunk iterator.
///
/// Text deltas are appended to [`content`](Self::content) as they arrive, so
/// the partial answer is still available when the stream fails midway.
#[derive(Debug, Default)]
pub struct CompletionCollector {
    content: String,
    metadata: Option<CompletionMetadata>,
    deltas: usize,
}

impl CompletionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `chunks` to the end.
    ///
    /// `on_delta` sees every non-empty text delta, `on_metadata` every metadata
    /// record. Returns the last metadata record, or the first error after the
    /// chunks preceding it were applied.
    pub fn drive<I, D, M>(
        &mut self,
        chunks: I,
        mut on_delta: D,
        mut on_metadata: M,
    ) -> Result<Option<CompletionMetadata>>
    where
        I: IntoIterator<Item = Result<StreamChunk>>,
        D: FnMut(&str),
        M: FnMut(&CompletionMetadata),
    {
        for chunk in chunks {
            match chunk? {
                StreamChunk::Delta { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    on_delta(&text);
                    self.content.push_str(&text);
                    self.deltas += 1;
                }
                StreamChunk::Metadata(meta) => {
                    on_metadata(&meta);
                    self.metadata = Some(meta);
                }
            }
        }
        Ok(self.metadata.clone())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> Option<&CompletionMetadata> {
        self.metadata.as_ref()
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn into_content(self) -> String {
        self.content
    }
}
