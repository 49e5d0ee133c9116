//! # Storage Schema Manager
//!
//! Creates the shared queue table on startup and checks that whatever table
//! already answers to the configured name can actually back a queue.

use super::dialect::{ExpectedColumn, QueueDialect};
use super::TableName;
use crate::error::{Result, TransportError};
use sqlx::Pool;
use tracing::{info, instrument, warn};

/// Idempotent table creation plus column verification
pub struct SchemaManager;

impl SchemaManager {
    /// Create the table and indexes if needed, then verify the columns.
    ///
    /// Safe to run concurrently from several processes. A failed `CREATE`
    /// is tolerated when the table that exists afterwards is compatible,
    /// since another initialiser may have won the race.
    #[instrument(skip_all, fields(table = %dialect.table()))]
    pub async fn ensure_table_is_created<D: QueueDialect>(
        dialect: &D,
        pool: &Pool<D::Database>,
    ) -> Result<()> {
        let created = dialect.create_table(pool).await;

        let columns = match dialect.table_columns(pool).await {
            Ok(columns) => columns,
            Err(inspect_err) => {
                return Err(created.err().unwrap_or(inspect_err));
            }
        };

        match created {
            Ok(()) => {
                Self::verify_columns(dialect.table(), &columns, dialect.expected_columns())?;
            }
            Err(create_err) if create_err.is_storage() && !columns.is_empty() => {
                Self::verify_columns(dialect.table(), &columns, dialect.expected_columns())?;
                warn!(error = %create_err, "Table creation failed but existing table is compatible");
            }
            Err(create_err) => return Err(create_err),
        }

        info!("✅ Queue table ready");
        Ok(())
    }

    /// Check `actual` `(column, type)` pairs against the required columns.
    ///
    /// Extra columns are allowed. Type names compare case-insensitively.
    pub fn verify_columns(
        table: &TableName,
        actual: &[(String, String)],
        expected: &[ExpectedColumn],
    ) -> Result<()> {
        if actual.is_empty() {
            return Err(TransportError::schema_conflict(
                table.to_string(),
                "table does not exist after creation",
            ));
        }

        let mut problems = Vec::new();
        for column in expected {
            let found = actual
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column.name));

            match found {
                None => problems.push(format!("missing column '{}'", column.name)),
                Some((_, data_type)) => {
                    let data_type = data_type.trim().to_ascii_lowercase();
                    if !column.accepted_types.contains(&data_type.as_str()) {
                        problems.push(format!(
                            "column '{}' has type '{data_type}', expected one of {:?}",
                            column.name, column.accepted_types
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TransportError::schema_conflict(
                table.to_string(),
                problems.join("; "),
            ))
        }
    }
}
