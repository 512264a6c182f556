//! flurry: streaming CSV ingestion into PostgreSQL or NDJSON.
//!
//! Reads a delimited text file as a sequence of arbitrarily cut chunks,
//! reassembles rows that straddle chunk boundaries, splits fields without
//! breaking on delimiters inside quotes, and persists each row with the
//! expected column count, one at a time and in input order.
//!
//! # Example
//!
//! ```ignore
//! use flurry::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let stats = run_pipeline(&config).await?;
//!     println!("Rows persisted: {}", stats.rows_persisted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod row;
pub mod sink;
pub mod source;

// Re-export main types
pub use config::Config;
pub use pipeline::{
    Pipeline, PipelineOptions, PipelineStats, run_pipeline, run_pipeline_with_shutdown,
};
pub use row::Record;
pub use sink::RowSink;
pub use source::ChunkSource;
