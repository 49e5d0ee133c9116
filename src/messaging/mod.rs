//! # Messaging Module
//!
//! Message values and the header protocol the transport understands.

pub mod delivery;
pub mod message;
pub mod queue_name;

pub use crate::constants::headers;
pub use delivery::DeliveryOptions;
pub use message::{Headers, TransportMessage};
pub use queue_name::validate_queue_name;
