//! # Database Operations
//!
//! Storage layer for the queue table, built on sqlx.
//!
//! ## Key Components
//!
//! - [`dialect`] - The statements a backend needs to act as a queue table
//! - [`connection`] - Pool ownership and per-scope connection hand-out
//! - [`scope`] - Unit-of-work transactions with a one-shot terminal state
//! - [`schema`] - Idempotent table creation and column verification
//!
//! Backends are feature-gated: `postgres` for production deployments using
//! `FOR UPDATE SKIP LOCKED`, `sqlite` for embedded and test use.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tablequeue::database::{ConnectionProvider, SqliteDialect, QueueDialect, SchemaManager, TableName};
//! use tablequeue::config::TransportConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::new("sqlite://queue.db", "orders");
//! let pool = SqliteDialect::connect(&config).await?;
//! let dialect = SqliteDialect::for_table(TableName::parse("messages")?);
//! SchemaManager::ensure_table_is_created(&dialect, &pool).await?;
//!
//! let provider = ConnectionProvider::new(pool);
//! let scope = provider.begin_scope();
//! scope.complete().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod dialect;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod schema;
pub mod scope;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod table_name;

pub use connection::ConnectionProvider;
pub use dialect::{ExpectedColumn, NewQueueRow, QueueDialect, QueueRow};
#[cfg(feature = "postgres")]
pub use postgres::PostgresDialect;
pub use schema::SchemaManager;
pub use scope::{ScopeStatus, TransactionScope};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDialect;
pub use table_name::TableName;
