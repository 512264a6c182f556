//! Error types for flurry using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use std::process::ExitCode;
use std::time::Duration;

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Schema has no columns.
    #[snafu(display("Schema must have at least one column"))]
    EmptySchema,

    /// Column name is blank.
    #[snafu(display("Column {index} has an empty name"))]
    BlankColumn { index: usize },

    /// Column declared twice.
    #[snafu(display("Column '{name}' is declared more than once"))]
    DuplicateColumn { name: String },

    /// Read buffer size is zero.
    #[snafu(display("source.read_buffer_kb must be at least 1"))]
    ZeroReadBuffer,

    /// Sink write timeout is zero.
    #[snafu(display("sink.write_timeout_secs must be at least 1"))]
    ZeroWriteTimeout,

    /// Required sink setting is missing.
    #[snafu(display("{sink} sink requires a non-empty '{setting}'"))]
    MissingSinkSetting {
        sink: &'static str,
        setting: &'static str,
    },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },
}

// ============ Source Errors ============

/// Errors raised by a chunk source while producing text chunks.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Failed to open the input.
    #[snafu(display("Failed to open input {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// Read from the underlying byte stream failed.
    #[snafu(display("Failed to read input {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Input bytes are not valid UTF-8.
    #[snafu(display("Invalid UTF-8 in {path} at byte offset {offset}"))]
    InvalidUtf8 { path: String, offset: u64 },

    /// Input ended in the middle of a multi-byte character.
    #[snafu(display("Input {path} ends with a truncated UTF-8 sequence ({pending} bytes)"))]
    TruncatedUtf8 { path: String, pending: usize },
}

// ============ Sink Errors ============

/// Errors reported by a row sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to connect to PostgreSQL.
    #[snafu(display("Failed to connect to PostgreSQL: {source}"))]
    Connect { source: tokio_postgres::Error },

    /// Failed to prepare the insert statement.
    #[snafu(display("Failed to prepare insert into {table}: {source}"))]
    Prepare {
        table: String,
        source: tokio_postgres::Error,
    },

    /// Insert was rejected by the database.
    #[snafu(display("Insert into {table} failed: {source}"))]
    Insert {
        table: String,
        source: tokio_postgres::Error,
    },

    /// IO error writing a file sink.
    #[snafu(display("Failed to write {path}: {source}"))]
    SinkIo {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize a row.
    #[snafu(display("Failed to serialize row: {source}"))]
    Serialize { source: serde_json::Error },

    /// Row does not match the declared column list.
    #[snafu(display("Row has {found} fields but the sink expects {expected}"))]
    ColumnMismatch { expected: usize, found: usize },

    /// Write did not complete in time.
    #[snafu(display("Sink write timed out after {}s", timeout.as_secs()))]
    Timeout { timeout: Duration },

    /// Sink was already closed.
    #[snafu(display("Sink is closed"))]
    Closed,
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder: {source}"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Chunk source ended abnormally.
    #[snafu(display("Source error: {source}"))]
    Source { source: SourceError },

    /// Sink could not be opened.
    #[snafu(display("Failed to open sink: {source}"))]
    SinkOpen { source: SinkError },

    /// Sink rejected a row.
    #[snafu(display("Failed to persist row {row} (line {line}): {source}"))]
    Persistence {
        row: u64,
        line: u64,
        source: SinkError,
    },

    /// Sink failed while closing.
    #[snafu(display("Failed to close sink: {source}"))]
    SinkClose { source: SinkError },

    /// A logical row never reached the expected column count.
    #[snafu(display(
        "Malformed row starting at line {line}: {field_count} fields, expected {expected} (after {merges} merges)"
    ))]
    MalformedRow {
        line: u64,
        field_count: usize,
        expected: usize,
        merges: u32,
    },

    /// Shutdown was requested before the input was exhausted.
    #[snafu(display("Interrupted after {rows} rows"))]
    Interrupted { rows: u64 },

    /// Address parsing error.
    #[snafu(display("Failed to parse address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },
}

impl PipelineError {
    /// Process exit status for this error.
    ///
    /// Persistence failures, malformed rows, and interrupts each get a
    /// distinct code; everything else is a generic failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Persistence { .. } => 2,
            PipelineError::MalformedRow { .. } => 3,
            PipelineError::Interrupted { .. } => 130,
            _ => 1,
        }
    }

    /// Returns true if the sink rejected a row.
    pub fn is_persistence(&self) -> bool {
        matches!(self, PipelineError::Persistence { .. })
    }
}

impl From<&PipelineError> for ExitCode {
    fn from(error: &PipelineError) -> Self {
        ExitCode::from(error.exit_code())
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<SourceError> for PipelineError {
    fn from(source: SourceError) -> Self {
        PipelineError::Source { source }
    }
}
