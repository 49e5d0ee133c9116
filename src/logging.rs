//! # Structured Logging Module
//!
//! Environment-aware structured logging for the transport and the services
//! embedding it. Output goes to the console, as human-readable text by default
//! or as JSON lines when `TABLEQUEUE_LOG_FORMAT=json`.

use crate::database::TableName;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` wins when set; otherwise the level follows the environment
/// name. Safe to call more than once, and a subscriber installed elsewhere
/// is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)))
        };
        let json = use_json_format();

        let console = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter())
        });
        let json_lines = json.then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter())
        });

        let subscriber = tracing_subscriber::registry().with(console).with(json_lines);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TABLEQUEUE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive for an environment when `RUST_LOG` is unset
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" | "staging" => "info,sqlx=warn",
        _ => "debug,sqlx=info",
    }
}

fn use_json_format() -> bool {
    std::env::var("TABLEQUEUE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for queue maintenance operations
pub fn log_queue_operation(
    operation: &str,
    table: &TableName,
    queue: Option<&str>,
    status: &str,
    rows_affected: Option<u64>,
) {
    tracing::info!(
        operation = %operation,
        table = %table,
        queue = queue,
        status = %status,
        rows_affected = rows_affected,
        timestamp = %Utc::now().to_rfc3339(),
        "📬 QUEUE_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("TABLEQUEUE_ENV", "staging");
        assert_eq!(get_environment(), "staging");
        std::env::remove_var("TABLEQUEUE_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug,sqlx=info");
        assert_eq!(get_log_level("development"), "debug,sqlx=info");
        assert_eq!(get_log_level("production"), "info,sqlx=warn");
        assert_eq!(get_log_level("staging"), "info,sqlx=warn");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_queue_operation(
            "purge",
            &TableName::parse("messages").unwrap(),
            Some("orders"),
            "success",
            Some(3),
        );
    }
}
