#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # tablequeue
//!
//! A message-queue transport backed by a single relational table.
//!
//! ## Overview
//!
//! Every logical queue shares one table keyed by `recipient_queue`. A send
//! inserts a row; a receive claims the next deliverable row with one atomic
//! `DELETE ... RETURNING` statement. Both run inside an explicit
//! [`TransactionScope`](database::TransactionScope), so nothing a scope sends
//! is visible, and nothing it receives is gone, until the scope completes.
//!
//! ## Key Features
//!
//! - **Deferred delivery**: rows become visible at `visible_at`, ordered by
//!   visibility time with `sequence_id` breaking ties
//! - **Concurrent receivers**: PostgreSQL claims skip rows locked by other
//!   transactions (`FOR UPDATE SKIP LOCKED`)
//! - **Expiry**: a time-to-be-received header sets `expires_at`; expired rows
//!   are never delivered and are removed by a background task
//! - **Two backends**: PostgreSQL for production, SQLite for embedded use and tests
//!
//! ## Module Organization
//!
//! - [`transport`] - The [`QueueTransport`](transport::QueueTransport) contract and table implementation
//! - [`database`] - Dialects, scopes, pooling and schema management
//! - [`messaging`] - Messages, headers and delivery options
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablequeue::config::ConfigLoader;
//! use tablequeue::messaging::{headers, Headers, TransportMessage};
//! use tablequeue::transport::{QueueTransport, PostgresTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tablequeue::logging::init_structured_logging();
//!
//! let config = ConfigLoader::new().load()?;
//! let transport = PostgresTransport::connect(config).await?;
//! transport.initialize().await?;
//!
//! let mut deferred = Headers::new();
//! deferred.insert(headers::DEFERRED_UNTIL, "2030-01-01T00:00:00Z");
//! let scope = transport.begin_scope();
//! transport
//!     .send("billing", &TransportMessage::with_generated_id(deferred, b"{}".to_vec()), &scope)
//!     .await?;
//! scope.complete().await?;
//!
//! let scope = transport.begin_scope();
//! let next = transport.receive(&scope, &CancellationToken::new()).await?;
//! scope.complete().await?;
//! # let _ = next;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                                  # Unit and SQLite integration tests
//! DATABASE_URL=postgres://... cargo test -- --ignored   # PostgreSQL integration tests
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod transport;

pub use config::{ConfigLoader, StorageKind, TransportConfig};
pub use database::{ScopeStatus, TableName, TransactionScope};
pub use error::{Result, TransportError};
pub use messaging::{DeliveryOptions, Headers, TransportMessage};
#[cfg(feature = "postgres")]
pub use transport::PostgresTransport;
#[cfg(feature = "sqlite")]
pub use transport::SqliteTransport;
pub use transport::{MessageStore, QueueTransport, TableTransport};
