//! # Transaction Scope
//!
//! One unit of work over one pooled connection. The transaction begins on the
//! first send or receive and ends exactly once, by [`TransactionScope::complete`]
//! (commit) or [`TransactionScope::abandon`] (rollback). Dropping an open scope
//! rolls back.
//!
//! Calls made concurrently on the same scope share its connection and are
//! serialised by an async mutex; independent scopes never contend here.

use crate::error::{Result, TransportError};
use sqlx::{Database, Pool, Transaction};
use std::fmt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Observable lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    Open,
    Completed,
    Abandoned,
}

impl ScopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum ScopeState<DB: Database> {
    /// `None` until the first operation begins the transaction
    Open(Option<Transaction<'static, DB>>),
    Completed,
    Abandoned,
}

impl<DB: Database> ScopeState<DB> {
    fn status(&self) -> ScopeStatus {
        match self {
            Self::Open(_) => ScopeStatus::Open,
            Self::Completed => ScopeStatus::Completed,
            Self::Abandoned => ScopeStatus::Abandoned,
        }
    }
}

/// A unit of work grouping sends and receives into one commit or rollback
pub struct TransactionScope<DB: Database> {
    id: Uuid,
    pool: Pool<DB>,
    state: Mutex<ScopeState<DB>>,
}

impl<DB: Database> TransactionScope<DB> {
    pub(crate) fn new(pool: Pool<DB>) -> Self {
        let id = Uuid::new_v4();
        debug!(scope_id = %id, "Scope opened");
        Self {
            id,
            pool,
            state: Mutex::new(ScopeState::Open(None)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn status(&self) -> ScopeStatus {
        self.state.lock().await.status()
    }

    /// Commit everything done in this scope.
    ///
    /// A scope that never touched storage completes without a round trip.
    /// If the commit itself fails the scope ends up abandoned.
    pub async fn complete(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, ScopeState::Completed) {
            ScopeState::Open(Some(tx)) => {
                if let Err(e) = tx.commit().await {
                    *state = ScopeState::Abandoned;
                    warn!(scope_id = %self.id, error = %e, "Scope commit failed");
                    return Err(e.into());
                }
                debug!(scope_id = %self.id, "Scope committed");
                Ok(())
            }
            ScopeState::Open(None) => Ok(()),
            terminal => {
                let status = terminal.status();
                *state = terminal;
                Err(TransportError::invalid_scope_state(
                    "complete",
                    status.as_str(),
                ))
            }
        }
    }

    /// Roll back everything done in this scope
    pub async fn abandon(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, ScopeState::Abandoned) {
            ScopeState::Open(Some(tx)) => {
                tx.rollback().await?;
                debug!(scope_id = %self.id, "Scope rolled back");
                Ok(())
            }
            ScopeState::Open(None) => Ok(()),
            terminal => {
                let status = terminal.status();
                *state = terminal;
                Err(TransportError::invalid_scope_state("abandon", status.as_str()))
            }
        }
    }

    /// Exclusive access to the scope's transaction, beginning it if needed
    pub(crate) async fn connection(&self, operation: &'static str) -> Result<ScopeConnection<'_, DB>> {
        let mut state = self.state.lock().await;
        match &mut *state {
            ScopeState::Open(tx) => {
                if tx.is_none() {
                    *tx = Some(self.pool.begin().await?);
                    debug!(scope_id = %self.id, "Scope transaction started");
                }
            }
            terminal => {
                return Err(TransportError::invalid_scope_state(
                    operation,
                    terminal.status().as_str(),
                ))
            }
        }

        Ok(ScopeConnection {
            scope_id: self.id,
            operation,
            state,
        })
    }
}

impl<DB: Database> Drop for TransactionScope<DB> {
    fn drop(&mut self) {
        if let ScopeState::Open(Some(_)) = self.state.get_mut() {
            // The transaction's own drop queues the rollback on its connection.
            debug!(scope_id = %self.id, "Scope dropped while open, rolling back");
        }
    }
}

impl<DB: Database> fmt::Debug for TransactionScope<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .state
            .try_lock()
            .map(|state| state.status().as_str())
            .unwrap_or("busy");
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("status", &status)
            .finish()
    }
}

/// Locked view of an open scope's transaction
pub(crate) struct ScopeConnection<'a, DB: Database> {
    scope_id: Uuid,
    operation: &'static str,
    state: MutexGuard<'a, ScopeState<DB>>,
}

impl<DB: Database> ScopeConnection<'_, DB> {
    pub(crate) fn connection(&mut self) -> Result<&mut DB::Connection> {
        match &mut *self.state {
            ScopeState::Open(Some(tx)) => Ok(&mut **tx),
            other => Err(TransportError::invalid_scope_state(
                self.operation,
                other.status().as_str(),
            )),
        }
    }

    /// Roll back and mark the scope abandoned.
    ///
    /// Used when a statement was interrupted and the transaction's state on
    /// the server is unknown.
    pub(crate) async fn abandon(mut self) {
        if let ScopeState::Open(Some(tx)) =
            std::mem::replace(&mut *self.state, ScopeState::Abandoned)
        {
            if let Err(e) = tx.rollback().await {
                warn!(
                    scope_id = %self.scope_id,
                    operation = self.operation,
                    error = %e,
                    "Rollback after interrupted statement failed"
                );
            }
        }
        debug!(scope_id = %self.scope_id, operation = self.operation, "Scope abandoned");
    }
}
