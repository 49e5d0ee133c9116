//! Logical queue names are data (bound as parameters), so they only need to
//! be non-empty, bounded and printable.

use crate::constants::limits::MAX_QUEUE_NAME_LENGTH;
use crate::error::{Result, TransportError};

pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TransportError::invalid_name(name, "queue name is empty"));
    }
    if name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(TransportError::invalid_name(
            name,
            format!("queue name exceeds {MAX_QUEUE_NAME_LENGTH} bytes"),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(TransportError::invalid_name(
            name,
            "queue name contains control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names() {
        assert!(validate_queue_name("orders").is_ok());
        assert!(validate_queue_name("billing.invoices@host").is_ok());
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("   ").is_err());
        assert!(validate_queue_name("line\nbreak").is_err());
        assert!(validate_queue_name(&"q".repeat(MAX_QUEUE_NAME_LENGTH + 1)).is_err());
    }
}
