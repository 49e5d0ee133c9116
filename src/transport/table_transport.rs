//! # Table Transport
//!
//! [`QueueTransport`] over one shared table. Every logical queue lives in the
//! same table keyed by `recipient_queue`, so creating a queue needs no DDL.

use super::cleanup::{spawn_expired_cleanup, CleanupHandle};
use super::store::MessageStore;
use super::QueueTransport;
use crate::config::{mask_connection_string, ConfigurationError, TransportConfig};
use crate::database::{ConnectionProvider, QueueDialect, TableName, TransactionScope};
use crate::error::Result;
use crate::logging::log_queue_operation;
use crate::messaging::{validate_queue_name, TransportMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::Pool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

#[cfg(feature = "postgres")]
pub type PostgresTransport = TableTransport<crate::database::PostgresDialect>;

#[cfg(feature = "sqlite")]
pub type SqliteTransport = TableTransport<crate::database::SqliteDialect>;

/// Table-backed queue transport for one receiving queue
pub struct TableTransport<D: QueueDialect> {
    config: TransportConfig,
    store: MessageStore<D>,
    provider: ConnectionProvider<D::Database>,
    shutdown: CancellationToken,
    cleanup: Mutex<Option<CleanupHandle>>,
}

impl<D: QueueDialect> TableTransport<D> {
    /// Validate `config` and open a pool for the dialect's backend
    pub async fn connect(config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let kind = config.storage_kind()?;
        if kind != D::STORAGE_KIND {
            return Err(ConfigurationError::invalid_value(
                "connection_string",
                mask_connection_string(&config.connection_string),
                format!("{:?} transport cannot use a {kind:?} connection", D::STORAGE_KIND),
            )
            .into());
        }

        let pool = D::connect(&config).await?;
        Self::with_pool(config, pool)
    }

    /// Build over an existing pool; `config.connection_string` is not used to connect
    pub fn with_pool(config: TransportConfig, pool: Pool<D::Database>) -> Result<Self> {
        config.validate()?;
        let table = config.parsed_table_name()?;

        info!(
            table = %table,
            queue = %config.queue_name,
            "✅ Table transport created"
        );

        Ok(Self {
            store: MessageStore::new(D::for_table(table)),
            provider: ConnectionProvider::new(pool),
            shutdown: CancellationToken::new(),
            cleanup: Mutex::new(None),
            config,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    pub fn table(&self) -> &TableName {
        self.store.table()
    }

    pub fn pool(&self) -> &Pool<D::Database> {
        self.provider.pool()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub async fn health_check(&self) -> Result<()> {
        self.provider.health_check().await
    }

    /// Messages of `queue` that a receive could claim right now
    pub async fn count(&self, queue: &str) -> Result<i64> {
        validate_queue_name(queue)?;
        self.store.count(self.pool(), queue).await
    }

    /// Delete every row of `queue`, outside any scope
    pub async fn purge(&self, queue: &str) -> Result<u64> {
        validate_queue_name(queue)?;
        let removed = self.store.purge(self.pool(), queue).await?;
        log_queue_operation("purge", self.table(), Some(queue), "success", Some(removed));
        Ok(removed)
    }

    /// Delete rows of every queue whose time to be received has passed
    pub async fn delete_expired(&self) -> Result<u64> {
        self.store.delete_expired(self.pool()).await
    }

    /// Start, or restart with a new interval, the expired-row cleanup task.
    ///
    /// The task stops on [`TableTransport::shutdown`] or when `cancel` fires.
    pub async fn start_expired_cleanup(&self, interval: Duration, cancel: &CancellationToken) {
        let handle = spawn_expired_cleanup(
            self.store.clone(),
            self.pool().clone(),
            interval,
            self.shutdown.child_token(),
            cancel.clone(),
        );
        let previous = self.cleanup.lock().replace(handle);
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(CleanupHandle::is_running)
    }

    /// Stop background work and close the pool
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.cleanup.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.provider.close().await;
        info!(queue = %self.queue_name(), "🛑 Table transport shut down");
    }
}

#[async_trait]
impl<D: QueueDialect> QueueTransport for TableTransport<D> {
    type Scope = TransactionScope<D::Database>;

    fn address(&self) -> &str {
        &self.config.queue_name
    }

    /// Ensure the table exists and start cleanup when an interval is configured
    #[instrument(skip(self), fields(table = %self.table()))]
    async fn initialize(&self) -> Result<()> {
        self.store.ensure_table_is_created(self.pool()).await?;
        log_queue_operation("initialize", self.table(), Some(self.queue_name()), "success", None);

        if let Some(interval) = self.config.expired_cleanup_interval() {
            if !self.is_cleanup_running() {
                self.start_expired_cleanup(interval, &self.shutdown).await;
            }
        }
        Ok(())
    }

    async fn create_queue(&self, name: &str) -> Result<()> {
        validate_queue_name(name)?;
        debug!(queue = %name, table = %self.table(), "📋 Queue registered on shared table");
        Ok(())
    }

    fn begin_scope(&self) -> Self::Scope {
        self.provider.begin_scope()
    }

    async fn send(
        &self,
        destination: &str,
        message: &TransportMessage,
        scope: &Self::Scope,
    ) -> Result<()> {
        self.store.send(scope, destination, message).await.map(|_| ())
    }

    async fn receive(
        &self,
        scope: &Self::Scope,
        cancel: &CancellationToken,
    ) -> Result<Option<TransportMessage>> {
        self.store
            .receive(scope, &self.config.queue_name, cancel)
            .await
    }
}

impl<D: QueueDialect> Drop for TableTransport<D> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
