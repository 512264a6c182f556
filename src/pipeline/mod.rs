//! Pipeline driver.
//!
//! Pulls chunks from a [`ChunkSource`], turns them into validated rows, and
//! persists each row through a [`RowSink`] before looking at the next one.
//! The first persistence failure stops the whole run.
//!
//! # Re-merging
//!
//! A candidate row that ends inside a quoted field is carried and joined to
//! the following line with the terminator restored. This reassembles rows
//! whose quoted fields contain newlines, blank lines included. With
//! `quoted_newlines` off, any row short of the column count is carried
//! instead. A carried row is reported as malformed once it can no longer
//! become valid, once it has absorbed `max_merge_attempts` lines, or when the
//! input ends while it is carried.

mod signal;

pub use signal::shutdown_signal;

use snafu::prelude::*;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::emit;
use crate::error::{PipelineError, SinkError, SinkOpenSnafu, SourceSnafu, TimeoutSnafu};
use crate::metrics::events::{
    BlankLineSkipped, PendingBufferSize, RowFailed, RowFailure, RowMerged, RowPersisted,
};
use crate::row::{
    CandidateRow, DELIMITER, QUOTE, Reassembler, Record, RowValidator, TERMINATOR, TrailingData,
    Validation, split_fields, unquote,
};
use crate::sink::{RowSink, open_sink};
use crate::source::{ChunkSource, ReaderChunkSource};

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub rows_persisted: u64,
    /// Lines absorbed into an earlier incomplete row.
    pub rows_merged: u64,
    pub blank_lines: u64,
    pub header_skipped: bool,
    /// Unterminated text left at end of input. It was not persisted.
    pub trailing: Option<TrailingData>,
}

/// Settings the driver runs with.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Column names, in order. Their count is the expected field count.
    pub columns: Vec<String>,
    pub has_header: bool,
    pub max_merge_attempts: u32,
    pub quoted_newlines: bool,
    pub write_timeout: Duration,
    /// Print progress every N persisted rows; 0 disables.
    pub progress_every: u64,
}

impl PipelineOptions {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            has_header: false,
            max_merge_attempts: 8,
            quoted_newlines: true,
            write_timeout: Duration::from_secs(30),
            progress_every: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            columns: config.schema.columns.clone(),
            has_header: config.source.has_header,
            max_merge_attempts: config.parsing.max_merge_attempts,
            quoted_newlines: config.parsing.quoted_newlines,
            write_timeout: config.sink.write_timeout(),
            progress_every: config.progress.every_rows,
        }
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_max_merge_attempts(mut self, attempts: u32) -> Self {
        self.max_merge_attempts = attempts;
        self
    }

    pub fn with_quoted_newlines(mut self, enabled: bool) -> Self {
        self.quoted_newlines = enabled;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_progress_every(mut self, rows: u64) -> Self {
        self.progress_every = rows;
        self
    }
}

/// An incomplete row waiting for the next line.
#[derive(Debug)]
struct Carry {
    line: u64,
    text: String,
    merges: u32,
    field_count: usize,
}

/// Mutable state owned by a single run.
struct IngestState {
    reassembler: Reassembler,
    carry: Option<Carry>,
    header_pending: bool,
    stats: PipelineStats,
}

impl IngestState {
    fn new(has_header: bool) -> Self {
        Self {
            reassembler: Reassembler::new(),
            carry: None,
            header_pending: has_header,
            stats: PipelineStats::default(),
        }
    }

    fn buffered_bytes(&self) -> usize {
        self.reassembler.pending().len() + self.carry.as_ref().map_or(0, |c| c.text.len())
    }
}

/// Streaming CSV ingestion pipeline.
pub struct Pipeline {
    options: PipelineOptions,
    validator: RowValidator,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, shutdown: CancellationToken) -> Self {
        let validator = RowValidator::new(options.columns.len(), options.quoted_newlines);
        Self {
            options,
            validator,
            shutdown,
        }
    }

    /// Run the source to exhaustion, persisting every valid row in order.
    ///
    /// The source is dropped and the sink closed on every exit path. If the
    /// run already failed, a close error is logged and the run's error wins.
    pub async fn run(
        &self,
        mut source: Box<dyn ChunkSource>,
        mut sink: Box<dyn RowSink>,
    ) -> Result<PipelineStats, PipelineError> {
        info!(
            source = source.describe(),
            sink = sink.name(),
            columns = self.options.columns.len(),
            "Starting pipeline"
        );

        let mut state = IngestState::new(self.options.has_header);
        let result = self.drive(source.as_mut(), sink.as_mut(), &mut state).await;
        drop(source);

        match (result, sink.close().await) {
            (Ok(()), Ok(())) => {
                info!(
                    rows = state.stats.rows_persisted,
                    bytes = state.stats.bytes_read,
                    "Pipeline completed"
                );
                Ok(state.stats)
            }
            (Ok(()), Err(source)) => Err(PipelineError::SinkClose { source }),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_error)) => {
                warn!(error = %close_error, "Failed to close sink after pipeline error");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        source: &mut dyn ChunkSource,
        sink: &mut dyn RowSink,
        state: &mut IngestState,
    ) -> Result<(), PipelineError> {
        loop {
            let chunk = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    return Err(self.interrupted(state));
                }

                chunk = source.next_chunk() => chunk.context(SourceSnafu)?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            state.stats.chunks_read += 1;
            state.stats.bytes_read += chunk.len() as u64;
            for candidate in state.reassembler.feed(&chunk) {
                self.process(candidate, sink, state).await?;
            }
            emit!(PendingBufferSize {
                bytes: state.buffered_bytes()
            });
        }

        self.finish(state)
    }

    /// Validate one candidate row, merging it into a carried row if any.
    async fn process(
        &self,
        candidate: CandidateRow,
        sink: &mut dyn RowSink,
        state: &mut IngestState,
    ) -> Result<(), PipelineError> {
        let (line, text, merges) = match state.carry.take() {
            Some(carry) => {
                emit!(RowMerged);
                state.stats.rows_merged += 1;
                let text = format!("{}{TERMINATOR}{}", carry.text, candidate.text);
                (carry.line, text, carry.merges + 1)
            }
            None if candidate.is_blank() => {
                state.stats.blank_lines += 1;
                emit!(BlankLineSkipped);
                return Ok(());
            }
            None if state.header_pending => {
                state.header_pending = false;
                self.skip_header(&candidate, state);
                return Ok(());
            }
            None => (candidate.line, candidate.text, 0),
        };

        match self.validator.check(&text) {
            Validation::Valid(record) => {
                if merges > 0 {
                    debug!(line, merges, "Reassembled row across lines");
                }
                self.persist(line, record, sink, state).await
            }
            Validation::Incomplete(fragment) => {
                if !self.validator.can_grow(&fragment)
                    || merges >= self.options.max_merge_attempts
                {
                    return Err(self.malformed(line, fragment.field_count, merges));
                }
                trace!(
                    line,
                    fields = fragment.field_count,
                    open_quote = fragment.open_quote,
                    "Row incomplete, carrying to next line"
                );
                state.carry = Some(Carry {
                    line,
                    text: fragment.text,
                    merges,
                    field_count: fragment.field_count,
                });
                Ok(())
            }
        }
    }

    /// Consume the header line. It is never validated or carried, so a
    /// mismatch with the configured columns is only reported.
    fn skip_header(&self, header: &CandidateRow, state: &mut IngestState) {
        state.stats.header_skipped = true;
        let names: Vec<String> = split_fields(&header.text, DELIMITER, QUOTE)
            .iter()
            .map(|field| unquote(field, QUOTE).trim().to_string())
            .collect();
        let matches = names
            .iter()
            .map(String::as_str)
            .eq(self.options.columns.iter().map(String::as_str));
        if matches {
            debug!(line = header.line, "Skipped header row");
        } else {
            warn!(
                line = header.line,
                header = ?names,
                columns = ?self.options.columns,
                "Header row does not match configured columns"
            );
        }
    }

    async fn persist(
        &self,
        line: u64,
        record: Record,
        sink: &mut dyn RowSink,
        state: &mut IngestState,
    ) -> Result<(), PipelineError> {
        let row = state.stats.rows_persisted + 1;
        let started = Instant::now();
        let timeout = self.options.write_timeout;

        let written = tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => {
                return Err(self.interrupted(state));
            }

            written = tokio::time::timeout(timeout, sink.write_row(&record)) => written,
        };
        let result: Result<(), SinkError> = match written {
            Ok(result) => result,
            Err(_) => TimeoutSnafu { timeout }.fail(),
        };

        if let Err(source) = result {
            error!(row, line, error = %source, "Failed to persist row");
            emit!(RowFailed {
                reason: RowFailure::Persistence
            });
            return Err(PipelineError::Persistence { row, line, source });
        }

        state.stats.rows_persisted = row;
        emit!(RowPersisted {
            duration: started.elapsed()
        });
        if self.options.progress_every > 0 && row % self.options.progress_every == 0 {
            println!("Rows persisted: {row}");
        }
        Ok(())
    }

    /// End-of-input checks: trailing text and a still-carried row.
    fn finish(&self, state: &mut IngestState) -> Result<(), PipelineError> {
        if let Some(trailing) = state.reassembler.take_remainder() {
            warn!(
                line = trailing.line,
                bytes = trailing.bytes,
                "Input ended without a row terminator, trailing data was not persisted"
            );
            emit!(RowFailed {
                reason: RowFailure::Trailing
            });
            state.stats.trailing = Some(trailing);
        }

        if let Some(carry) = state.carry.take() {
            return Err(self.malformed(carry.line, carry.field_count, carry.merges));
        }
        Ok(())
    }

    fn malformed(&self, line: u64, field_count: usize, merges: u32) -> PipelineError {
        let expected = self.validator.expected();
        error!(line, field_count, expected, merges, "Malformed row");
        emit!(RowFailed {
            reason: RowFailure::Malformed
        });
        PipelineError::MalformedRow {
            line,
            field_count,
            expected,
            merges,
        }
    }

    fn interrupted(&self, state: &IngestState) -> PipelineError {
        let rows = state.stats.rows_persisted;
        info!(rows, "Shutdown requested, stopping pipeline");
        PipelineError::Interrupted { rows }
    }
}

/// Open the configured source and sink and run the pipeline until the input
/// is exhausted, a row fails, or a shutdown signal arrives.
pub async fn run_pipeline(config: &Config) -> Result<PipelineStats, PipelineError> {
    let shutdown = CancellationToken::new();

    // Set up signal handler for graceful shutdown
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    run_pipeline_with_shutdown(config, shutdown).await
}

/// Like [`run_pipeline`], stopping when `shutdown` is cancelled.
pub async fn run_pipeline_with_shutdown(
    config: &Config,
    shutdown: CancellationToken,
) -> Result<PipelineStats, PipelineError> {
    let source = ReaderChunkSource::open(&config.source)
        .await
        .context(SourceSnafu)?;
    let sink = open_sink(&config.sink, &config.schema.columns)
        .await
        .context(SinkOpenSnafu)?;

    let pipeline = Pipeline::new(PipelineOptions::from_config(config), shutdown);
    pipeline.run(Box::new(source), sink).await
}
