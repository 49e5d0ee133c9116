//! Configuration Loader
//!
//! Layers an optional configuration file (YAML, TOML or JSON, picked by
//! extension) under `TABLEQUEUE_*` environment variables, then validates.

use super::error::{ConfigResult, ConfigurationError};
use super::TransportConfig;
use crate::constants::ENV_PREFIX;
use config::{Config, Environment, File};
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};

/// Placeholder that defers the connection string to `DATABASE_URL`
const DATABASE_URL_PLACEHOLDER: &str = "${DATABASE_URL}";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Required configuration file; its extension selects the format
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Override the environment variable prefix (default `TABLEQUEUE`)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load, resolve `DATABASE_URL` fallbacks and validate
    pub fn load(&self) -> ConfigResult<TransportConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            debug!("Loading transport configuration from {}", path.display());
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        let mut config: TransportConfig = builder.build()?.try_deserialize()?;
        config.connection_string = Self::resolve_connection_string(&config.connection_string)?;
        config.validate()?;

        info!(
            queue = %config.queue_name,
            table = %config.table_name,
            config = %config.sanitized(),
            "Transport configuration loaded"
        );

        Ok(config)
    }

    /// Empty or `${DATABASE_URL}` falls back to the `DATABASE_URL` variable
    fn resolve_connection_string(configured: &str) -> ConfigResult<String> {
        let trimmed = configured.trim();
        if !trimmed.is_empty() && trimmed != DATABASE_URL_PLACEHOLDER {
            return Ok(trimmed.to_string());
        }

        match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Ok(url),
            _ if trimmed == DATABASE_URL_PLACEHOLDER => Err(ConfigurationError::missing_value(
                "DATABASE_URL (referenced by connection_string)",
            )),
            _ => Err(ConfigurationError::missing_value("connection_string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablequeue.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "connection_string: sqlite://queue.db\nqueue_name: orders\ntable_name: transport.messages\nmax_connections: 4"
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_env_prefix("TQ_TEST_YAML_UNUSED")
            .with_file(&path)
            .load()
            .unwrap();

        assert_eq!(config.connection_string, "sqlite://queue.db");
        assert_eq!(config.queue_name, "orders");
        assert_eq!(config.table_name, "transport.messages");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout_seconds, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablequeue.toml");
        std::fs::write(
            &path,
            "connection_string = \"sqlite://queue.db\"\nqueue_name = \"orders\"\n",
        )
        .unwrap();

        env::set_var("TQ_TEST_ENV_OVERRIDE_QUEUE_NAME", "invoices");
        env::set_var("TQ_TEST_ENV_OVERRIDE_MAX_CONNECTIONS", "3");
        let config = ConfigLoader::new()
            .with_env_prefix("TQ_TEST_ENV_OVERRIDE")
            .with_file(&path)
            .load()
            .unwrap();
        env::remove_var("TQ_TEST_ENV_OVERRIDE_QUEUE_NAME");
        env::remove_var("TQ_TEST_ENV_OVERRIDE_MAX_CONNECTIONS");

        assert_eq!(config.queue_name, "invoices");
        assert_eq!(config.max_connections, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigLoader::new()
            .with_env_prefix("TQ_TEST_MISSING_FILE")
            .with_file("/definitely/not/here/tablequeue.yaml")
            .load();
        assert!(matches!(result, Err(ConfigurationError::Load(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablequeue.json");
        std::fs::write(
            &path,
            r#"{"connection_string": "sqlite://queue.db", "queue_name": "orders", "table_name": "1bad"}"#,
        )
        .unwrap();

        let result = ConfigLoader::new()
            .with_env_prefix("TQ_TEST_INVALID_VALUES")
            .with_file(&path)
            .load();
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_explicit_connection_string_kept() {
        assert_eq!(
            ConfigLoader::resolve_connection_string(" sqlite://queue.db ").unwrap(),
            "sqlite://queue.db"
        );
    }
}
