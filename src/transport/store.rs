//! # Message Store
//!
//! Maps [`TransportMessage`]s to queue rows and runs the store operations on a
//! scope's transaction. Header-driven options are parsed once per send; the
//! claim is always one statement issued by the dialect.

use crate::database::{
    NewQueueRow, QueueDialect, QueueRow, SchemaManager, TableName, TransactionScope,
};
use crate::error::{Result, TransportError};
use crate::messaging::{validate_queue_name, DeliveryOptions, Headers, TransportMessage};
use chrono::{DateTime, Utc};
use sqlx::Pool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Row-level operations over one queue table
pub struct MessageStore<D: QueueDialect> {
    dialect: Arc<D>,
}

impl<D: QueueDialect> Clone for MessageStore<D> {
    fn clone(&self) -> Self {
        Self {
            dialect: Arc::clone(&self.dialect),
        }
    }
}

impl<D: QueueDialect> MessageStore<D> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect: Arc::new(dialect),
        }
    }

    pub fn table(&self) -> &TableName {
        self.dialect.table()
    }

    pub async fn ensure_table_is_created(&self, pool: &Pool<D::Database>) -> Result<()> {
        SchemaManager::ensure_table_is_created(self.dialect.as_ref(), pool).await
    }

    /// Build the row a send of `message` to `destination` at `now` stores
    pub fn encode(
        destination: &str,
        message: &TransportMessage,
        now: DateTime<Utc>,
    ) -> Result<NewQueueRow> {
        let options = DeliveryOptions::from_headers(message.headers())?;

        Ok(NewQueueRow {
            recipient_queue: options.recipient(destination).to_string(),
            visible_at: options.visible_at(now),
            expires_at: options.expires_at(now)?,
            headers: message.headers().to_json()?,
            body: message.body().to_vec(),
        })
    }

    /// Rebuild a message from a claimed row
    pub fn decode(row: QueueRow) -> Result<TransportMessage> {
        let headers = Headers::from_json(&row.headers).map_err(|e| {
            TransportError::serialization(format!(
                "row {} has malformed headers: {e}",
                row.sequence_id
            ))
        })?;
        Ok(TransportMessage::new(headers, row.body))
    }

    /// Insert one row within `scope`, returning its sequence id.
    ///
    /// Options are parsed before the scope's connection is taken, so a bad
    /// header never begins a transaction.
    #[instrument(skip_all, fields(table = %self.table(), destination = %destination))]
    pub async fn send(
        &self,
        scope: &TransactionScope<D::Database>,
        destination: &str,
        message: &TransportMessage,
    ) -> Result<i64> {
        validate_queue_name(destination)?;
        let row = Self::encode(destination, message, Utc::now())?;

        let mut scoped = scope.connection("send").await?;
        let sequence_id = self.dialect.insert(scoped.connection()?, &row).await?;

        debug!(
            sequence_id,
            queue = %row.recipient_queue,
            visible_at = %row.visible_at,
            "📤 Message stored"
        );
        Ok(sequence_id)
    }

    /// Claim the next deliverable message of `queue` within `scope`.
    ///
    /// Returns `Ok(None)` at once when nothing is deliverable. A token that is
    /// already cancelled returns [`TransportError::Cancelled`] without touching
    /// storage. Cancellation while the claim statement is in flight rolls the
    /// scope back and leaves it abandoned.
    #[instrument(skip_all, fields(table = %self.table(), queue = %queue))]
    pub async fn receive(
        &self,
        scope: &TransactionScope<D::Database>,
        queue: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<TransportMessage>> {
        if cancel.is_cancelled() {
            return Err(TransportError::cancelled("receive"));
        }

        let mut scoped = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled("receive")),
            scoped = scope.connection("receive") => scoped?,
        };

        let now = Utc::now();
        let claimed = {
            let conn = scoped.connection()?;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                row = self.dialect.claim_next(conn, queue, now) => Some(row),
            }
        };

        let row = match claimed {
            Some(row) => row?,
            None => {
                warn!(scope_id = %scope.id(), "Receive cancelled during claim, abandoning scope");
                scoped.abandon().await;
                return Err(TransportError::cancelled("receive"));
            }
        };
        drop(scoped);

        match row {
            Some(row) => {
                debug!(sequence_id = row.sequence_id, "📥 Message claimed");
                Self::decode(row).map(Some)
            }
            None => {
                debug!("Queue empty");
                Ok(None)
            }
        }
    }

    /// Deliverable rows of `queue` right now
    pub async fn count(&self, pool: &Pool<D::Database>, queue: &str) -> Result<i64> {
        self.dialect.count_ready(pool, queue, Utc::now()).await
    }

    pub async fn purge(&self, pool: &Pool<D::Database>, queue: &str) -> Result<u64> {
        self.dialect.purge(pool, queue).await
    }

    /// Remove rows whose expiry has passed
    pub async fn delete_expired(&self, pool: &Pool<D::Database>) -> Result<u64> {
        self.dialect.delete_expired(pool, Utc::now()).await
    }
}
