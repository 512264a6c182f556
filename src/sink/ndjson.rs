//! NDJSON file sink.

use async_trait::async_trait;
use snafu::prelude::*;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::{RowObject, RowSink};
use crate::error::{ClosedSnafu, SinkError, SinkIoSnafu};
use crate::row::Record;

/// Writes each row as one JSON object per line, flushed before the write
/// is acknowledged.
pub struct NdjsonSink {
    writer: Option<BufWriter<File>>,
    path: String,
    columns: Vec<String>,
}

impl NdjsonSink {
    /// Create (or append to) the output file.
    pub async fn create(path: &str, columns: &[String], append: bool) -> Result<Self, SinkError> {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(path).await.context(SinkIoSnafu { path })?;
        debug!(path, append, "Opened NDJSON output");

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path: path.to_string(),
            columns: columns.to_vec(),
        })
    }
}

#[async_trait]
impl RowSink for NdjsonSink {
    async fn write_row(&mut self, record: &Record) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().context(ClosedSnafu)?;
        let mut line = RowObject::new(&self.columns, record, false)?.to_json()?;
        line.push('\n');

        writer
            .write_all(line.as_bytes())
            .await
            .context(SinkIoSnafu { path: &self.path })?;
        writer
            .flush()
            .await
            .context(SinkIoSnafu { path: &self.path })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .await
            .context(SinkIoSnafu { path: &self.path })?;
        writer
            .get_ref()
            .sync_all()
            .await
            .context(SinkIoSnafu { path: &self.path })?;
        debug!(path = %self.path, "Closed NDJSON output");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ndjson"
    }
}
