//! Configuration parsing and validation.
//!
//! Handles loading the YAML config file, expanding environment references,
//! and deriving the options the pipeline driver runs with.

mod vars;

pub use vars::{Expanded, expand_env};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{
    BlankColumnSnafu, ConfigError, DuplicateColumnSnafu, EmptySchemaSnafu, EmptySourcePathSnafu,
    EnvInterpolationSnafu, MissingSinkSettingSnafu, ReadFileSnafu, YamlParseSnafu,
    ZeroReadBufferSnafu, ZeroWriteTimeoutSnafu,
};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;

/// Source path that selects standard input.
pub const STDIN_PATH: &str = "-";

/// Main configuration structure for the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub schema: SchemaConfig,
    pub sink: SinkConfig,
    /// Row reassembly settings (optional).
    #[serde(default)]
    pub parsing: ParsingConfig,
    /// Stdout progress reporting (optional).
    #[serde(default)]
    pub progress: ProgressConfig,
    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where the CSV text comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Local file path, or `-` for standard input.
    pub path: String,

    /// Size of each raw read from the input, in KiB (default: 64).
    #[serde(default = "default_read_buffer_kb")]
    pub read_buffer_kb: usize,

    /// Whether the first logical row is a header to skip (default: false).
    #[serde(default)]
    pub has_header: bool,
}

fn default_read_buffer_kb() -> usize {
    64
}

impl SourceConfig {
    /// Read buffer size in bytes.
    pub fn read_buffer_bytes(&self) -> usize {
        self.read_buffer_kb * KB
    }

    /// Returns true if the source is standard input.
    pub fn is_stdin(&self) -> bool {
        self.path == STDIN_PATH
    }
}

/// Fixed, ordered column list every row must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    pub columns: Vec<String>,
}

impl SchemaConfig {
    /// Number of fields a valid row must have.
    pub fn expected_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Row reassembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsingConfig {
    /// How many following lines an incomplete row may absorb before it is
    /// reported as malformed (default: 8).
    #[serde(default = "default_max_merge_attempts")]
    pub max_merge_attempts: u32,

    /// Treat a row with an unbalanced quote as still inside a quoted field,
    /// so quoted newlines are reassembled (default: true).
    #[serde(default = "default_quoted_newlines")]
    pub quoted_newlines: bool,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            max_merge_attempts: default_max_merge_attempts(),
            quoted_newlines: default_quoted_newlines(),
        }
    }
}

fn default_max_merge_attempts() -> u32 {
    8
}

fn default_quoted_newlines() -> bool {
    true
}

/// Destination for validated rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(flatten)]
    pub kind: SinkKind,

    /// Per-row persistence timeout in seconds (default: 30).
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_write_timeout_secs() -> u64 {
    30
}

impl SinkConfig {
    /// Per-row persistence timeout.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Supported sink backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkKind {
    /// One `INSERT` per row into a PostgreSQL table.
    Postgres {
        /// libpq-style or URI connection string.
        connection_string: String,
        /// Target table, optionally schema-qualified.
        table: String,
        /// Store empty fields as NULL (default: true).
        #[serde(default = "default_empty_as_null")]
        empty_as_null: bool,
    },
    /// One JSON object per line in a local file.
    Ndjson {
        path: String,
        /// Append to an existing file instead of truncating (default: false).
        #[serde(default)]
        append: bool,
    },
}

fn default_empty_as_null() -> bool {
    true
}

impl SinkKind {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SinkKind::Postgres { .. } => "postgres",
            SinkKind::Ndjson { .. } => "ndjson",
        }
    }

    /// Human-readable destination for logging.
    pub fn target(&self) -> &str {
        match self {
            SinkKind::Postgres { table, .. } => table,
            SinkKind::Ndjson { path, .. } => path,
        }
    }
}

/// Stdout progress reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressConfig {
    /// Print the running row count every N rows; 0 prints only the total
    /// (default: 1000).
    #[serde(default = "default_every_rows")]
    pub every_rows: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            every_rows: default_every_rows(),
        }
    }
}

fn default_every_rows() -> u64 {
    1000
}

/// Metrics configuration for Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to serve metrics (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text, expanding environment references.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(content);
        if !expanded.is_clean() {
            return EnvInterpolationSnafu {
                message: expanded.problems.join("\n"),
            }
            .fail();
        }

        let config: Config = serde_yaml::from_str(&expanded.text).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.path.is_empty(), EmptySourcePathSnafu);
        ensure!(self.source.read_buffer_kb > 0, ZeroReadBufferSnafu);
        ensure!(!self.schema.columns.is_empty(), EmptySchemaSnafu);

        let mut seen = HashSet::new();
        for (index, name) in self.schema.columns.iter().enumerate() {
            ensure!(!name.trim().is_empty(), BlankColumnSnafu { index });
            ensure!(
                seen.insert(name.as_str()),
                DuplicateColumnSnafu { name: name.clone() }
            );
        }

        ensure!(self.sink.write_timeout_secs > 0, ZeroWriteTimeoutSnafu);
        match &self.sink.kind {
            SinkKind::Postgres {
                connection_string,
                table,
                ..
            } => {
                ensure!(
                    !connection_string.is_empty(),
                    MissingSinkSettingSnafu {
                        sink: "postgres",
                        setting: "connection_string",
                    }
                );
                ensure!(
                    !table.is_empty(),
                    MissingSinkSettingSnafu {
                        sink: "postgres",
                        setting: "table",
                    }
                );
            }
            SinkKind::Ndjson { path, .. } => {
                ensure!(
                    !path.is_empty(),
                    MissingSinkSettingSnafu {
                        sink: "ndjson",
                        setting: "path",
                    }
                );
            }
        }
        Ok(())
    }
}
