//! In-memory chunk source.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::ChunkSource;
use crate::emit;
use crate::error::SourceError;
use crate::metrics::events::ChunkRead;

/// Yields a fixed list of chunks exactly as given.
#[derive(Debug, Clone, Default)]
pub struct MemoryChunkSource {
    chunks: VecDeque<String>,
}

impl MemoryChunkSource {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    /// Cut `text` into chunks of at most `size` bytes, respecting character
    /// boundaries.
    pub fn chunked(text: &str, size: usize) -> Self {
        let size = size.max(1);
        let mut chunks = VecDeque::new();
        let mut rest = text;
        while !rest.is_empty() {
            let mut cut = size.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            let (head, tail) = rest.split_at(cut);
            chunks.push_back(head.to_string());
            rest = tail;
        }
        Self { chunks }
    }

    /// Number of chunks not yet handed out.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl ChunkSource for MemoryChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<String>, SourceError> {
        let chunk = self.chunks.pop_front();
        if let Some(chunk) = &chunk {
            emit!(ChunkRead {
                bytes: chunk.len() as u64
            });
        }
        Ok(chunk)
    }

    fn describe(&self) -> &str {
        "memory"
    }
}
