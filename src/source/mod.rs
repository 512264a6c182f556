//! Chunk sources.
//!
//! A source yields the input as ordered text chunks whose boundaries have no
//! relation to row boundaries. Bytes are decoded as UTF-8 when the source is
//! opened; a multi-byte character split across two reads is held back until
//! it is complete.

mod decoder;
mod memory;
mod reader;

pub use decoder::Utf8ChunkDecoder;
pub use memory::MemoryChunkSource;
pub use reader::{ReaderChunkSource, STDIN_LABEL};

use async_trait::async_trait;

use crate::error::SourceError;

/// A lazy, finite, ordered sequence of text chunks.
#[async_trait]
pub trait ChunkSource: Send {
    /// Return the next chunk, or `None` once the input is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<String>, SourceError>;

    /// Where the chunks come from, for logging.
    fn describe(&self) -> &str;
}
