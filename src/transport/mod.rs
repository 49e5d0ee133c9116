//! # Queue Transport
//!
//! The public send/receive contract and its table-backed implementation.
//!
//! ## Example Usage
//!
//! ```rust
//! use tablequeue::config::TransportConfig;
//! use tablequeue::messaging::{Headers, TransportMessage};
//! use tablequeue::transport::{QueueTransport, SqliteTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let config = TransportConfig::new("sqlite::memory:", "orders");
//! let transport = SqliteTransport::connect(config).await?;
//! transport.initialize().await?;
//!
//! let scope = transport.begin_scope();
//! let message = TransportMessage::with_generated_id(Headers::new(), b"hello".to_vec());
//! transport.send("orders", &message, &scope).await?;
//! scope.complete().await?;
//!
//! let scope = transport.begin_scope();
//! let received = transport.receive(&scope, &CancellationToken::new()).await?;
//! scope.complete().await?;
//! assert_eq!(received.map(|m| m.body().to_vec()), Some(b"hello".to_vec()));
//!
//! transport.shutdown().await;
//! # Ok::<(), tablequeue::TransportError>(())
//! # }).unwrap();
//! ```

mod cleanup;
pub mod store;
pub mod table_transport;

use crate::error::Result;
use crate::messaging::TransportMessage;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use store::MessageStore;
#[cfg(feature = "postgres")]
pub use table_transport::PostgresTransport;
#[cfg(feature = "sqlite")]
pub use table_transport::SqliteTransport;
pub use table_transport::TableTransport;

/// Send/receive contract a message bus drives
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Unit of work handle passed explicitly to every operation
    type Scope: Send + Sync;

    /// Queue this transport receives from
    fn address(&self) -> &str;

    /// Prepare storage; idempotent, called once at startup
    async fn initialize(&self) -> Result<()>;

    /// Make `name` usable as a destination
    async fn create_queue(&self, name: &str) -> Result<()>;

    fn begin_scope(&self) -> Self::Scope;

    /// Enqueue `message` for `destination`, visible once `scope` completes
    async fn send(
        &self,
        destination: &str,
        message: &TransportMessage,
        scope: &Self::Scope,
    ) -> Result<()>;

    /// Claim the next deliverable message for [`QueueTransport::address`]
    async fn receive(
        &self,
        scope: &Self::Scope,
        cancel: &CancellationToken,
    ) -> Result<Option<TransportMessage>>;
}
