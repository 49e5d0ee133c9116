//! # SQLite Dialect
//!
//! SQLite admits a single writer at a time, so `DELETE ... RETURNING` over an
//! ordered sub-select is already an atomic claim: the first statement of a
//! scope takes the write lock and holds it until the scope ends. Other
//! writers wait up to the configured busy timeout.
//!
//! Timestamps are stored as microseconds since the Unix epoch so that
//! ordering and range filters are plain integer comparisons.

use super::dialect::{ExpectedColumn, NewQueueRow, QueueDialect, QueueRow};
use super::table_name::quote_identifier;
use super::TableName;
use crate::config::{StorageKind, TransportConfig};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info, warn};

const EXPECTED_COLUMNS: &[ExpectedColumn] = &[
    ExpectedColumn {
        name: "sequence_id",
        accepted_types: &["integer"],
    },
    ExpectedColumn {
        name: "recipient_queue",
        accepted_types: &["text"],
    },
    ExpectedColumn {
        name: "visible_at",
        accepted_types: &["integer"],
    },
    ExpectedColumn {
        name: "expires_at",
        accepted_types: &["integer"],
    },
    ExpectedColumn {
        name: "headers",
        accepted_types: &["text"],
    },
    ExpectedColumn {
        name: "body",
        accepted_types: &["blob"],
    },
];

#[derive(Debug, Clone)]
struct Statements {
    create_table: String,
    create_visibility_index: String,
    create_expiry_index: String,
    insert: String,
    claim_next: String,
    count_ready: String,
    purge: String,
    delete_expired: String,
}

impl Statements {
    fn render(table: &TableName) -> Self {
        let t = table.qualified();
        // SQLite qualifies the index name, never the indexed table.
        let index = |suffix: &str| match table.schema() {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                table.derived_identifier(suffix)
            ),
            None => table.derived_identifier(suffix),
        };
        let bare = quote_identifier(table.name());

        Self {
            create_table: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {t} (
                    sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipient_queue TEXT NOT NULL,
                    visible_at INTEGER NOT NULL,
                    expires_at INTEGER NULL,
                    headers TEXT NOT NULL,
                    body BLOB NOT NULL
                )
                "#
            ),
            create_visibility_index: format!(
                "CREATE INDEX IF NOT EXISTS {} ON {bare} (recipient_queue, visible_at, sequence_id)",
                index("visibility_idx")
            ),
            create_expiry_index: format!(
                "CREATE INDEX IF NOT EXISTS {} ON {bare} (expires_at) WHERE expires_at IS NOT NULL",
                index("expiry_idx")
            ),
            insert: format!(
                r#"
                INSERT INTO {t} (recipient_queue, visible_at, expires_at, headers, body)
                VALUES (?1, ?2, ?3, ?4, ?5)
                RETURNING sequence_id
                "#
            ),
            claim_next: format!(
                r#"
                DELETE FROM {t}
                WHERE sequence_id = (
                    SELECT sequence_id
                    FROM {t}
                    WHERE recipient_queue = ?1
                      AND visible_at <= ?2
                      AND (expires_at IS NULL OR expires_at > ?2)
                    ORDER BY visible_at ASC, sequence_id ASC
                    LIMIT 1
                )
                RETURNING sequence_id, recipient_queue, visible_at, expires_at, headers, body
                "#
            ),
            count_ready: format!(
                r#"
                SELECT COUNT(*)
                FROM {t}
                WHERE recipient_queue = ?1
                  AND visible_at <= ?2
                  AND (expires_at IS NULL OR expires_at > ?2)
                "#
            ),
            purge: format!("DELETE FROM {t} WHERE recipient_queue = ?1"),
            delete_expired: format!(
                "DELETE FROM {t} WHERE expires_at IS NOT NULL AND expires_at <= ?1"
            ),
        }
    }
}

/// Queue table statements for SQLite
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    table: TableName,
    sql: Statements,
}

fn to_micros(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_micros()
}

fn from_micros(column: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        TransportError::serialization(format!("column {column}: {micros} is out of range"))
    })
}

fn decode_row(row: &SqliteRow) -> Result<QueueRow> {
    let visible_at: i64 = row.try_get("visible_at")?;
    let expires_at: Option<i64> = row.try_get("expires_at")?;

    Ok(QueueRow {
        sequence_id: row.try_get("sequence_id")?,
        recipient_queue: row.try_get("recipient_queue")?,
        visible_at: from_micros("visible_at", visible_at)?,
        expires_at: expires_at
            .map(|micros| from_micros("expires_at", micros))
            .transpose()?,
        headers: row.try_get("headers")?,
        body: row.try_get("body")?,
    })
}

fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

#[async_trait]
impl QueueDialect for SqliteDialect {
    type Database = Sqlite;

    const STORAGE_KIND: StorageKind = StorageKind::Sqlite;

    fn for_table(table: TableName) -> Self {
        let sql = Statements::render(&table);
        Self { table, sql }
    }

    fn table(&self) -> &TableName {
        &self.table
    }

    async fn connect(config: &TransportConfig) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(&config.connection_string)?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout());

        let pool_options = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout());

        // Every connection to `:memory:` is its own database, so the pool must
        // keep exactly one connection alive for the lifetime of the transport.
        let pool = if is_in_memory(&config.connection_string) {
            if config.max_connections > 1 {
                warn!(
                    requested = config.max_connections,
                    "In-memory SQLite supports one connection; concurrent scopes will wait"
                );
            }
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            pool_options
                .max_connections(config.max_connections)
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                )
                .await?
        };

        info!(
            max_connections = pool.options().get_max_connections(),
            "🚀 Opened SQLite queue storage"
        );
        Ok(pool)
    }

    async fn create_table(&self, pool: &SqlitePool) -> Result<()> {
        sqlx::query(&self.sql.create_table).execute(pool).await?;
        sqlx::query(&self.sql.create_visibility_index)
            .execute(pool)
            .await?;
        sqlx::query(&self.sql.create_expiry_index)
            .execute(pool)
            .await?;

        debug!(table = %self.table, "Queue table ensured");
        Ok(())
    }

    async fn table_columns(&self, pool: &SqlitePool) -> Result<Vec<(String, String)>> {
        let columns = sqlx::query_as::<_, (String, String)>(
            "SELECT name, type FROM pragma_table_info(?1, ?2) ORDER BY cid",
        )
        .bind(self.table.name())
        .bind(self.table.schema().unwrap_or("main"))
        .fetch_all(pool)
        .await?;

        Ok(columns)
    }

    fn expected_columns(&self) -> &'static [ExpectedColumn] {
        EXPECTED_COLUMNS
    }

    async fn insert(&self, conn: &mut SqliteConnection, row: &NewQueueRow) -> Result<i64> {
        let sequence_id = sqlx::query_scalar::<_, i64>(&self.sql.insert)
            .bind(&row.recipient_queue)
            .bind(to_micros(row.visible_at))
            .bind(row.expires_at.map(to_micros))
            .bind(&row.headers)
            .bind(&row.body)
            .fetch_one(conn)
            .await?;

        Ok(sequence_id)
    }

    async fn claim_next(
        &self,
        conn: &mut SqliteConnection,
        queue: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueRow>> {
        let row = sqlx::query(&self.sql.claim_next)
            .bind(queue)
            .bind(to_micros(now))
            .fetch_optional(conn)
            .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn count_ready(&self, pool: &SqlitePool, queue: &str, now: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&self.sql.count_ready)
            .bind(queue)
            .bind(to_micros(now))
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    async fn purge(&self, pool: &SqlitePool, queue: &str) -> Result<u64> {
        let result = sqlx::query(&self.sql.purge)
            .bind(queue)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(&self.sql.delete_expired)
            .bind(to_micros(now))
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
