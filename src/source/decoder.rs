//! Incremental UTF-8 decoding of raw reads.

use bytes::{Buf, BytesMut};

use crate::error::{InvalidUtf8Snafu, SourceError, TruncatedUtf8Snafu};

/// Decodes a byte stream into text one read at a time.
///
/// Bytes of an incomplete trailing character are kept until the next read
/// supplies the rest.
#[derive(Debug)]
pub struct Utf8ChunkDecoder {
    path: String,
    pending: BytesMut,
    /// Stream offset of the first byte in `pending`.
    offset: u64,
}

impl Utf8ChunkDecoder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pending: BytesMut::new(),
            offset: 0,
        }
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    ///
    /// Returns `None` when the read only contributed part of a character.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Option<String>, SourceError> {
        self.pending.extend_from_slice(bytes);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_some() => {
                return InvalidUtf8Snafu {
                    path: self.path.clone(),
                    offset: self.offset + e.valid_up_to() as u64,
                }
                .fail();
            }
            Err(e) => e.valid_up_to(),
        };
        if valid == 0 {
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        self.pending.advance(valid);
        self.offset += valid as u64;
        Ok(Some(text))
    }

    /// Number of bytes decoded so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Check that the stream did not stop inside a character.
    pub fn finish(&self) -> Result<(), SourceError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        TruncatedUtf8Snafu {
            path: self.path.clone(),
            pending: self.pending.len(),
        }
        .fail()
    }
}
