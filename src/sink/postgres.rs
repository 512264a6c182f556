//! PostgreSQL sink: one `INSERT` per row on a single connection.
//!
//! Each row travels as one JSON text parameter and is expanded with
//! `json_populate_record`, so PostgreSQL coerces every field to the declared
//! type of its column.

use async_trait::async_trait;
use snafu::prelude::*;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, error, info, warn};

use super::{RowObject, RowSink};
use crate::error::{ClosedSnafu, ConnectSnafu, InsertSnafu, PrepareSnafu, SinkError};
use crate::row::Record;

/// Quote a single identifier. A `.` inside it is part of the name.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a table name, keeping a schema qualifier (`schema.table`) intact.
pub fn quote_table(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Build the per-row insert statement for `table` and `columns`.
pub fn build_insert(table: &str, columns: &[String]) -> String {
    let table = quote_table(table);
    let columns = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM json_populate_record(NULL::{table}, $1::text::json)"
    )
}

/// Writes rows into a PostgreSQL table.
pub struct PostgresSink {
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    statement: Statement,
    table: String,
    columns: Vec<String>,
    empty_as_null: bool,
}

impl PostgresSink {
    /// Connect and prepare the insert statement.
    pub async fn connect(
        connection_string: &str,
        table: &str,
        columns: &[String],
        empty_as_null: bool,
    ) -> Result<Self, SinkError> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .context(ConnectSnafu)?;
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        let sql = build_insert(table, columns);
        debug!(%sql, "Preparing insert statement");
        let statement = match client.prepare(&sql).await.context(PrepareSnafu { table }) {
            Ok(statement) => statement,
            Err(e) => {
                connection.abort();
                return Err(e);
            }
        };
        info!(table, columns = columns.len(), "Connected to PostgreSQL");

        Ok(Self {
            client: Some(client),
            connection: Some(connection),
            statement,
            table: table.to_string(),
            columns: columns.to_vec(),
            empty_as_null,
        })
    }
}

#[async_trait]
impl RowSink for PostgresSink {
    async fn write_row(&mut self, record: &Record) -> Result<(), SinkError> {
        let client = self.client.as_ref().context(ClosedSnafu)?;
        let json = RowObject::new(&self.columns, record, self.empty_as_null)?.to_json()?;
        client
            .execute(&self.statement, &[&json])
            .await
            .context(InsertSnafu {
                table: self.table.as_str(),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        // Dropping the client ends the connection future.
        drop(self.client.take());
        if let Some(connection) = self.connection.take() {
            join_connection(&self.table, connection).await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Wait for the connection task to end. Returns false if it panicked or was
/// aborted.
async fn join_connection(table: &str, connection: JoinHandle<()>) -> bool {
    match connection.await {
        Ok(()) => {
            debug!(table, "PostgreSQL connection closed");
            true
        }
        Err(e) => {
            warn!(table, error = %e, "PostgreSQL connection task failed");
            false
        }
    }
}

impl Drop for PostgresSink {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("doctors"), "\"doctors\"");
        assert_eq!(quote_ident("a.b"), "\"a.b\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("doctors"), "\"doctors\"");
        assert_eq!(quote_table("public.doctors"), "\"public\".\"doctors\"");
    }

    #[test]
    fn test_build_insert() {
        let columns = vec!["npi".to_string(), "last_name".to_string()];
        assert_eq!(
            build_insert("doctors", &columns),
            "INSERT INTO \"doctors\" (\"npi\", \"last_name\") SELECT \"npi\", \"last_name\" \
             FROM json_populate_record(NULL::\"doctors\", $1::text::json)"
        );
    }

    #[test]
    fn test_build_insert_keeps_dotted_column_whole() {
        let columns = vec!["geo.lat".to_string()];
        assert_eq!(
            build_insert("public.doctors", &columns),
            "INSERT INTO \"public\".\"doctors\" (\"geo.lat\") SELECT \"geo.lat\" \
             FROM json_populate_record(NULL::\"public\".\"doctors\", $1::text::json)"
        );
    }

    #[tokio::test]
    async fn test_join_connection_reports_failed_task() {
        assert!(join_connection("t", tokio::spawn(async {})).await);

        let stuck = tokio::spawn(std::future::pending::<()>());
        stuck.abort();
        assert!(!join_connection("t", stuck).await);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connect_error() {
        let result = PostgresSink::connect(
            "host=127.0.0.1 port=1 user=flurry connect_timeout=1",
            "t",
            &["a".to_string()],
            true,
        )
        .await;
        assert!(matches!(result, Err(SinkError::Connect { .. })));
    }
}
