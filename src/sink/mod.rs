//! Row sinks.
//!
//! A sink accepts one validated row at a time, in input order, and reports
//! success or failure before the next row is offered.

mod ndjson;
mod postgres;

pub use ndjson::NdjsonSink;
pub use postgres::{PostgresSink, build_insert, quote_ident, quote_table};

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use snafu::prelude::*;
use tracing::info;

use crate::config::{SinkConfig, SinkKind};
use crate::error::{ColumnMismatchSnafu, SerializeSnafu, SinkError};
use crate::row::Record;

/// Persistence destination for validated rows.
#[async_trait]
pub trait RowSink: Send {
    /// Persist one row. The row is durable once this returns `Ok`.
    async fn write_row(&mut self, record: &Record) -> Result<(), SinkError>;

    /// Release the sink's resources. Further writes fail with
    /// [`SinkError::Closed`].
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Open the sink described by `config` for rows with the given columns.
pub async fn open_sink(
    config: &SinkConfig,
    columns: &[String],
) -> Result<Box<dyn RowSink>, SinkError> {
    info!(
        sink = config.kind.name(),
        target = config.kind.target(),
        "Opening sink"
    );
    let sink: Box<dyn RowSink> = match &config.kind {
        SinkKind::Postgres {
            connection_string,
            table,
            empty_as_null,
        } => Box::new(
            PostgresSink::connect(connection_string, table, columns, *empty_as_null).await?,
        ),
        SinkKind::Ndjson { path, append } => {
            Box::new(NdjsonSink::create(path, columns, *append).await?)
        }
    };
    Ok(sink)
}

/// A record viewed as a JSON object keyed by column name, in column order.
pub struct RowObject<'a> {
    columns: &'a [String],
    record: &'a Record,
    empty_as_null: bool,
}

impl<'a> RowObject<'a> {
    pub fn new(
        columns: &'a [String],
        record: &'a Record,
        empty_as_null: bool,
    ) -> Result<Self, SinkError> {
        ensure!(
            columns.len() == record.len(),
            ColumnMismatchSnafu {
                expected: columns.len(),
                found: record.len(),
            }
        );
        Ok(Self {
            columns,
            record,
            empty_as_null,
        })
    }

    pub fn to_json(&self) -> Result<String, SinkError> {
        serde_json::to_string(self).context(SerializeSnafu)
    }
}

impl Serialize for RowObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.record.fields()) {
            if self.empty_as_null && value.is_empty() {
                map.serialize_entry(column, &None::<&str>)?;
            } else {
                map.serialize_entry(column, value)?;
            }
        }
        map.end()
    }
}
