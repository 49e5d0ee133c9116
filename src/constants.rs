//! # Transport Constants
//!
//! Header names understood by the transport and the defaults applied when
//! configuration leaves a value out.

/// Headers the transport reads at send time. All other headers are opaque.
pub mod headers {
    /// Message identifier, carried for upstream deduplication only
    pub const MESSAGE_ID: &str = "msg-id";
    /// RFC 3339 timestamp that becomes the row's visibility time
    pub const DEFERRED_UNTIL: &str = "deferred-until";
    /// Overrides the destination queue at insert time
    pub const DEFERRED_RECIPIENT: &str = "deferred-recipient";
    /// Lifetime of the message, whole seconds or `HH:MM:SS`
    pub const TIME_TO_BE_RECEIVED: &str = "time-to-be-received";
}

/// Defaults for [`crate::config::TransportConfig`]
pub mod defaults {
    pub const TABLE_NAME: &str = "messages";
    pub const MAX_CONNECTIONS: u32 = 10;
    pub const ACQUIRE_TIMEOUT_SECONDS: u64 = 30;
    pub const BUSY_TIMEOUT_SECONDS: u64 = 30;
    pub const EXPIRED_CLEANUP_INTERVAL_SECONDS: u64 = 60;
}

/// Name limits
pub mod limits {
    /// PostgreSQL truncates identifiers past 63 bytes
    pub const MAX_IDENTIFIER_LENGTH: usize = 63;
    pub const MAX_QUEUE_NAME_LENGTH: usize = 255;
}

/// Prefix for environment variable overrides, e.g. `TABLEQUEUE_QUEUE_NAME`
pub const ENV_PREFIX: &str = "TABLEQUEUE";
