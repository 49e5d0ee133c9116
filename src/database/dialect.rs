//! # Storage Dialects
//!
//! The SQL a backend needs to act as a queue table. Everything above this
//! trait (header handling, scopes, cancellation) is shared; everything below
//! it is one database's statements and column encodings.

use super::TableName;
use crate::config::{StorageKind, TransportConfig};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};

/// Row as written by a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueRow {
    pub recipient_queue: String,
    pub visible_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// JSON object text
    pub headers: String,
    pub body: Vec<u8>,
}

/// Row as returned by a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    pub sequence_id: i64,
    pub recipient_queue: String,
    pub visible_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub headers: String,
    pub body: Vec<u8>,
}

/// Column the backing table must have, with the type names it may carry
#[derive(Debug, Clone, Copy)]
pub struct ExpectedColumn {
    pub name: &'static str,
    /// Lowercase type names as reported by the catalog
    pub accepted_types: &'static [&'static str],
}

/// Statements for one backend, bound to one table
#[async_trait]
pub trait QueueDialect: Send + Sync + 'static {
    type Database: Database;

    const STORAGE_KIND: StorageKind;

    fn for_table(table: TableName) -> Self;

    fn table(&self) -> &TableName;

    /// Open a pool sized and tuned from configuration
    async fn connect(config: &TransportConfig) -> Result<Pool<Self::Database>>;

    /// Idempotent DDL for the table and its indexes
    async fn create_table(&self, pool: &Pool<Self::Database>) -> Result<()>;

    /// `(column, type)` pairs of the existing table; empty when it does not exist
    async fn table_columns(&self, pool: &Pool<Self::Database>) -> Result<Vec<(String, String)>>;

    fn expected_columns(&self) -> &'static [ExpectedColumn];

    /// Insert one row, returning its sequence id
    async fn insert(
        &self,
        conn: &mut <Self::Database as Database>::Connection,
        row: &NewQueueRow,
    ) -> Result<i64>;

    /// Delete and return the next deliverable row of `queue` in one statement
    async fn claim_next(
        &self,
        conn: &mut <Self::Database as Database>::Connection,
        queue: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueRow>>;

    /// Rows of `queue` that a receive at `now` could claim
    async fn count_ready(
        &self,
        pool: &Pool<Self::Database>,
        queue: &str,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    async fn purge(&self, pool: &Pool<Self::Database>, queue: &str) -> Result<u64>;

    async fn delete_expired(&self, pool: &Pool<Self::Database>, now: DateTime<Utc>) -> Result<u64>;
}
