use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tokio_postgres::types::Json;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use registrar_api::{ClientError, Entrant, RecordStore, Registration, StoredRecord};

const SQL_CREATE: &str = include_str!("../sql/create_tournaments.sql");

pub const DEFAULT_TABLE: &str = "tournaments";

/// PostgreSQL record store.
///
/// One row per registration; the roster is kept as JSONB. Identity and
/// timestamps come from column defaults and are read back with `RETURNING`.
/// The single `Client` pipelines concurrent queries over one connection.
pub struct PostgresStore {
    client: Client,
    table: String,
}

impl PostgresStore {
    /// Connect to `uri` and spawn the connection driver on the current runtime.
    pub async fn connect(uri: &str, table: &str) -> Result<Self, ClientError> {
        if !is_identifier(table) {
            return Err(ClientError::config(format!("invalid table name '{table}'")));
        }

        let (client, connection) = tokio_postgres::connect(uri, NoTls)
            .await
            .map_err(|e| ClientError::io(format!("postgres connect: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed");
            }
        });

        tracing::info!(table = %table, "connected to postgres");
        Ok(Self {
            client,
            table: table.to_string(),
        })
    }
}

impl RecordStore for PostgresStore {
    fn init(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(async {
            let sql = SQL_CREATE.replace("{table}", &self.table);
            self.client
                .batch_execute(&sql)
                .await
                .map_err(|e| ClientError::io(format!("create table {}: {e}", self.table)))
        })
    }

    fn insert(
        &self,
        registration: Registration,
    ) -> Pin<Box<dyn Future<Output = Result<StoredRecord, ClientError>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO {} (name, year, kind, roster) VALUES ($1, $2, $3, $4) \
                 RETURNING id, created_at, updated_at",
                self.table
            );
            let row = self
                .client
                .query_one(
                    &sql,
                    &[
                        &registration.name,
                        &registration.year,
                        &registration.kind,
                        &Json(&registration.roster),
                    ],
                )
                .await
                .map_err(|e| ClientError::io(format!("insert: {e}")))?;

            Ok(StoredRecord {
                id: column(&row, "id")?,
                registration,
                created_at: column(&row, "created_at")?,
                updated_at: column(&row, "updated_at")?,
            })
        })
    }

    fn query_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StoredRecord>, ClientError>> + Send + '_>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT id, name, year, kind, roster, created_at, updated_at FROM {}",
                self.table
            );
            let rows = self
                .client
                .query(&sql, &[])
                .await
                .map_err(|e| ClientError::io(format!("select: {e}")))?;

            rows.iter().map(row_to_record).collect()
        })
    }
}

fn row_to_record(row: &Row) -> Result<StoredRecord, ClientError> {
    let roster: Json<Vec<Entrant>> = column(row, "roster")?;
    let id: Uuid = column(row, "id")?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;
    let updated_at: DateTime<Utc> = column(row, "updated_at")?;
    Ok(StoredRecord {
        id,
        registration: Registration {
            name: column(row, "name")?,
            year: column(row, "year")?,
            kind: column(row, "kind")?,
            roster: roster.0,
        },
        created_at,
        updated_at,
    })
}

fn column<'a, T>(row: &'a Row, name: &str) -> Result<T, ClientError>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(name)
        .map_err(|e| ClientError::format(format!("column {name}: {e}")))
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(is_identifier("tournaments"));
        assert!(is_identifier("_t2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2cup"));
        assert!(!is_identifier("t; DROP TABLE x"));
    }

    #[test]
    fn create_statement_targets_the_table() {
        let sql = SQL_CREATE.replace("{table}", DEFAULT_TABLE);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS tournaments"));
        assert!(sql.contains("roster"));
    }
}
