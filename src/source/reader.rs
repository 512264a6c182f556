//! Chunk source over an async byte reader: a local file or stdin.

use async_trait::async_trait;
use snafu::prelude::*;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::{ChunkSource, Utf8ChunkDecoder};
use crate::config::SourceConfig;
use crate::emit;
use crate::error::{OpenSnafu, ReadSnafu, SourceError};
use crate::metrics::events::ChunkRead;

/// Label used for standard input in logs and errors.
pub const STDIN_LABEL: &str = "<stdin>";

/// Reads fixed-size blocks from a byte stream and decodes them as UTF-8.
pub struct ReaderChunkSource {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    path: String,
    buf: Vec<u8>,
    decoder: Utf8ChunkDecoder,
    exhausted: bool,
}

impl ReaderChunkSource {
    /// Open the configured file, or stdin for `-`.
    pub async fn open(config: &SourceConfig) -> Result<Self, SourceError> {
        let read_buffer = config.read_buffer_bytes();
        if config.is_stdin() {
            return Ok(Self::from_reader(tokio::io::stdin(), STDIN_LABEL, read_buffer));
        }

        let file = tokio::fs::File::open(&config.path)
            .await
            .context(OpenSnafu {
                path: config.path.clone(),
            })?;
        debug!(path = %config.path, read_buffer, "Opened input file");
        Ok(Self::from_reader(file, config.path.clone(), read_buffer))
    }

    /// Wrap any async reader, reading at most `read_buffer` bytes at a time.
    pub fn from_reader(
        reader: impl AsyncRead + Send + Unpin + 'static,
        path: impl Into<String>,
        read_buffer: usize,
    ) -> Self {
        let path = path.into();
        Self {
            reader: Box::new(reader),
            decoder: Utf8ChunkDecoder::new(path.clone()),
            path,
            buf: vec![0; read_buffer.max(1)],
            exhausted: false,
        }
    }
}

#[async_trait]
impl ChunkSource for ReaderChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<String>, SourceError> {
        while !self.exhausted {
            let n = self.reader.read(&mut self.buf).await.context(ReadSnafu {
                path: self.path.clone(),
            })?;
            if n == 0 {
                self.exhausted = true;
                self.decoder.finish()?;
                debug!(path = %self.path, bytes = self.decoder.offset(), "Input exhausted");
                break;
            }

            emit!(ChunkRead { bytes: n as u64 });
            if let Some(text) = self.decoder.decode(&self.buf[..n])? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    fn describe(&self) -> &str {
        &self.path
    }
}
