//! Shared setup for integration tests.
#![allow(dead_code)]

use std::time::Duration;
use tablequeue::database::QueueDialect;
use tablequeue::messaging::{headers, Headers, TransportMessage};
use tablequeue::transport::{QueueTransport, SqliteTransport, TableTransport};
use tablequeue::TransportConfig;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A SQLite database file living as long as the test
pub struct TestDb {
    dir: TempDir,
}

impl TestDb {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn connection_string(&self) -> String {
        format!("sqlite://{}", self.dir.path().join("queue.db").display())
    }

    pub fn config(&self, queue: &str) -> TransportConfig {
        TransportConfig::new(self.connection_string(), queue)
            .with_max_connections(8)
            .with_expired_cleanup_interval(Duration::ZERO)
    }

    /// Connected and initialised transport receiving from `queue`
    pub async fn transport(&self, queue: &str) -> anyhow::Result<SqliteTransport> {
        let transport = SqliteTransport::connect(self.config(queue)).await?;
        transport.initialize().await?;
        Ok(transport)
    }
}

pub fn message_with_id(id: &str) -> TransportMessage {
    message_with(id, &[])
}

pub fn message_with(id: &str, extra: &[(&str, &str)]) -> TransportMessage {
    let mut map = Headers::new();
    map.insert(headers::MESSAGE_ID, id);
    for (key, value) in extra {
        map.insert(key, *value);
    }
    TransportMessage::new(map, id.as_bytes().to_vec())
}

/// Send and commit in a scope of its own
pub async fn send_committed<D: QueueDialect>(
    transport: &TableTransport<D>,
    destination: &str,
    message: &TransportMessage,
) -> anyhow::Result<()> {
    let scope = transport.begin_scope();
    transport.send(destination, message, &scope).await?;
    scope.complete().await?;
    Ok(())
}

/// Receive and commit in a scope of its own, returning the message id
pub async fn receive_committed<D: QueueDialect>(
    transport: &TableTransport<D>,
) -> anyhow::Result<Option<String>> {
    let scope = transport.begin_scope();
    let received = transport.receive(&scope, &CancellationToken::new()).await?;
    scope.complete().await?;
    Ok(received.and_then(|m| m.message_id().map(str::to_string)))
}
