//! # PostgreSQL Dialect
//!
//! Claims use `FOR UPDATE SKIP LOCKED` inside the `DELETE`, so concurrent
//! receivers skip rows another open transaction has already claimed instead
//! of waiting on them. A claim that rolls back releases its row lock and the
//! row is selectable again.

use super::dialect::{ExpectedColumn, NewQueueRow, QueueDialect, QueueRow};
use super::table_name::quote_identifier;
use super::TableName;
use crate::config::{StorageKind, TransportConfig};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use tracing::{debug, info};

const EXPECTED_COLUMNS: &[ExpectedColumn] = &[
    ExpectedColumn {
        name: "sequence_id",
        accepted_types: &["bigint"],
    },
    ExpectedColumn {
        name: "recipient_queue",
        accepted_types: &["text", "character varying"],
    },
    ExpectedColumn {
        name: "visible_at",
        accepted_types: &["timestamp with time zone"],
    },
    ExpectedColumn {
        name: "expires_at",
        accepted_types: &["timestamp with time zone"],
    },
    ExpectedColumn {
        name: "headers",
        accepted_types: &["text", "character varying"],
    },
    ExpectedColumn {
        name: "body",
        accepted_types: &["bytea"],
    },
];

/// Pre-rendered statements for one table
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
        Self {
            create_table: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {t} (
                    sequence_id BIGSERIAL PRIMARY KEY,
                    recipient_queue TEXT NOT NULL,
                    visible_at TIMESTAMPTZ NOT NULL,
                    expires_at TIMESTAMPTZ NULL,
                    headers TEXT NOT NULL,
                    body BYTEA NOT NULL
                )
                "#
            ),
            create_visibility_index: format!(
                "CREATE INDEX IF NOT EXISTS {} ON {t} (recipient_queue, visible_at, sequence_id)",
                table.derived_identifier("visibility_idx")
            ),
            create_expiry_index: format!(
                "CREATE INDEX IF NOT EXISTS {} ON {t} (expires_at) WHERE expires_at IS NOT NULL",
                table.derived_identifier("expiry_idx")
            ),
            insert: format!(
                r#"
                INSERT INTO {t} (recipient_queue, visible_at, expires_at, headers, body)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING sequence_id
                "#
            ),
            claim_next: format!(
                r#"
                DELETE FROM {t}
                WHERE sequence_id = (
                    SELECT sequence_id
                    FROM {t}
                    WHERE recipient_queue = $1
                      AND visible_at <= $2
                      AND (expires_at IS NULL OR expires_at > $2)
                    ORDER BY visible_at ASC, sequence_id ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING sequence_id, recipient_queue, visible_at, expires_at, headers, body
                "#
            ),
            count_ready: format!(
                r#"
                SELECT COUNT(*)
                FROM {t}
                WHERE recipient_queue = $1
                  AND visible_at <= $2
                  AND (expires_at IS NULL OR expires_at > $2)
                "#
            ),
            purge: format!("DELETE FROM {t} WHERE recipient_queue = $1"),
            delete_expired: format!(
                r#"
                DELETE FROM {t}
                WHERE sequence_id IN (
                    SELECT sequence_id
                    FROM {t}
                    WHERE expires_at IS NOT NULL AND expires_at <= $1
                    FOR UPDATE SKIP LOCKED
                )
                "#
            ),
        }
    }
}

/// Queue table statements for PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    table: TableName,
    sql: Statements,
}

fn decode_row(row: &PgRow) -> Result<QueueRow> {
    Ok(QueueRow {
        sequence_id: row.try_get("sequence_id")?,
        recipient_queue: row.try_get("recipient_queue")?,
        visible_at: row.try_get("visible_at")?,
        expires_at: row.try_get("expires_at")?,
        headers: row.try_get("headers")?,
        body: row.try_get("body")?,
    })
}

#[async_trait]
impl QueueDialect for PostgresDialect {
    type Database = Postgres;

    const STORAGE_KIND: StorageKind = StorageKind::Postgres;

    fn for_table(table: TableName) -> Self {
        let sql = Statements::render(&table);
        Self { table, sql }
    }

    fn table(&self) -> &TableName {
        &self.table
    }

    async fn connect(config: &TransportConfig) -> Result<PgPool> {
        info!(
            max_connections = config.max_connections,
            "🚀 Connecting to PostgreSQL queue storage"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.connection_string)
            .await?;

        Ok(pool)
    }

    async fn create_table(&self, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;

        // Serialise concurrent initialisation of the same table across processes.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(self.table.to_string())
            .execute(&mut *tx)
            .await?;

        if let Some(schema) = self.table.schema() {
            sqlx::query(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_identifier(schema)
            ))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(&self.sql.create_table)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&self.sql.create_visibility_index)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&self.sql.create_expiry_index)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(table = %self.table, "Queue table ensured");
        Ok(())
    }

    async fn table_columns(&self, pool: &PgPool) -> Result<Vec<(String, String)>> {
        let columns = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema::text = COALESCE($1::text, current_schema()::text)
              AND table_name::text = $2::text
            ORDER BY ordinal_position
            "#,
        )
        .bind(self.table.schema())
        .bind(self.table.name())
        .fetch_all(pool)
        .await?;

        Ok(columns)
    }

    fn expected_columns(&self) -> &'static [ExpectedColumn] {
        EXPECTED_COLUMNS
    }

    async fn insert(&self, conn: &mut PgConnection, row: &NewQueueRow) -> Result<i64> {
        let sequence_id = sqlx::query_scalar::<_, i64>(&self.sql.insert)
            .bind(&row.recipient_queue)
            .bind(row.visible_at)
            .bind(row.expires_at)
            .bind(&row.headers)
            .bind(&row.body)
            .fetch_one(conn)
            .await?;

        Ok(sequence_id)
    }

    async fn claim_next(
        &self,
        conn: &mut PgConnection,
        queue: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueRow>> {
        let row = sqlx::query(&self.sql.claim_next)
            .bind(queue)
            .bind(now)
            .fetch_optional(conn)
            .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn count_ready(&self, pool: &PgPool, queue: &str, now: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&self.sql.count_ready)
            .bind(queue)
            .bind(now)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    async fn purge(&self, pool: &PgPool, queue: &str) -> Result<u64> {
        let result = sqlx::query(&self.sql.purge)
            .bind(queue)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, pool: &PgPool, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(&self.sql.delete_expired)
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_a_single_locking_delete() {
        let dialect = PostgresDialect::for_table(TableName::parse("transport.messages").unwrap());
        let claim = &dialect.sql.claim_next;

        assert!(claim.trim_start().starts_with("DELETE FROM \"transport\".\"messages\""));
        assert!(claim.contains("FOR UPDATE SKIP LOCKED"));
        assert!(claim.contains("ORDER BY visible_at ASC, sequence_id ASC"));
        assert!(claim.contains("RETURNING"));
    }

    #[test]
    fn test_index_names_derive_from_table() {
        let dialect = PostgresDialect::for_table(TableName::parse("orders_q").unwrap());
        assert!(dialect
            .sql
            .create_visibility_index
            .contains("\"orders_q_visibility_idx\" ON \"orders_q\""));
        assert!(dialect.sql.create_expiry_index.contains("WHERE expires_at IS NOT NULL"));
    }
}
