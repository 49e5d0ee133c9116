//! Pool ownership and per-scope connection hand-out.

use super::scope::TransactionScope;
use crate::error::Result;
use sqlx::{Connection, Database, Pool};
use tracing::{debug, info};

/// Owns the pool every scope draws its connection from
#[derive(Debug)]
pub struct ConnectionProvider<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Clone for ConnectionProvider<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> ConnectionProvider<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    /// New scope; no connection is taken until its first operation
    pub fn begin_scope(&self) -> TransactionScope<DB> {
        TransactionScope::new(self.pool.clone())
    }

    /// Acquire a connection and ping it
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        debug!(
            size = self.pool.size(),
            idle = self.pool.num_idle(),
            "Storage health check passed"
        );
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
        info!("🔌 Storage pool closed");
    }
}
