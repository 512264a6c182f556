//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline and
//! records the matching Prometheus metric when emitted. With no recorder
//! installed the calls are no-ops.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when the source yields a chunk of text.
pub struct ChunkRead {
    pub bytes: u64,
}

impl InternalEvent for ChunkRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Chunk read");
        counter!("flurry_chunks_read_total").increment(1);
        counter!("flurry_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when a row is accepted by the sink.
pub struct RowPersisted {
    pub duration: Duration,
}

impl InternalEvent for RowPersisted {
    fn emit(self) {
        trace!(duration_us = self.duration.as_micros(), "Row persisted");
        counter!("flurry_rows_persisted_total").increment(1);
        histogram!("flurry_sink_write_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when an incomplete row absorbs the following line.
pub struct RowMerged;

impl InternalEvent for RowMerged {
    fn emit(self) {
        trace!("Row merged with following line");
        counter!("flurry_rows_merged_total").increment(1);
    }
}

/// Event emitted when a blank line is skipped.
pub struct BlankLineSkipped;

impl InternalEvent for BlankLineSkipped {
    fn emit(self) {
        counter!("flurry_blank_lines_total").increment(1);
    }
}

/// Why a row did not make it into the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFailure {
    /// Sink rejected or timed out on the row.
    Persistence,
    /// Row never reached the expected column count.
    Malformed,
    /// Unterminated text left at end of input.
    Trailing,
}

impl RowFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowFailure::Persistence => "persistence",
            RowFailure::Malformed => "malformed",
            RowFailure::Trailing => "trailing",
        }
    }
}

/// Event emitted when a row fails.
pub struct RowFailed {
    pub reason: RowFailure,
}

impl InternalEvent for RowFailed {
    fn emit(self) {
        trace!(reason = self.reason.as_str(), "Row failed");
        counter!("flurry_rows_failed_total", "reason" => self.reason.as_str()).increment(1);
    }
}

/// Event emitted when the pending buffer changes size.
pub struct PendingBufferSize {
    pub bytes: usize,
}

impl InternalEvent for PendingBufferSize {
    fn emit(self) {
        gauge!("flurry_pending_buffer_bytes").set(self.bytes as f64);
    }
}
