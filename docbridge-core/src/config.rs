// docbridge-core/src/config.rs
//! Client configuration.
//!
//! A [`ClientConfig`] can be built in code, loaded from a JSON file, or read
//! from `DOCBRIDGE_*` environment variables.
//!
//! ```rust
//! use docbridge_core::{ClientConfig, ConnectMode};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("mongodb://localhost:27017", "app")
//!     .with_id_field("id")
//!     .with_connect_mode(ConnectMode::Lazy)
//!     .with_server_selection_timeout(Duration::from_secs(5));
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mongodb::options::ClientOptions;
use serde::{Deserialize, Serialize};

use crate::error::{DocBridgeError, Result};

pub const DEFAULT_URL: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "test";
pub const DEFAULT_ID_FIELD: &str = "id";

/// When the driver client is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMode {
    /// Connect (and ping) while constructing the client.
    Eager,
    /// Connect on the first operation.
    #[default]
    Lazy,
}

impl FromStr for ConnectMode {
    type Err = DocBridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eager" => Ok(ConnectMode::Eager),
            "lazy" => Ok(ConnectMode::Lazy),
            other => Err(DocBridgeError::Config(format!(
                "unknown connect mode '{}', expected 'eager' or 'lazy'",
                other
            ))),
        }
    }
}

/// Settings for a [`crate::DocumentStoreClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection string for a local deployment or Atlas
    pub connection_url: String,
    pub database_name: String,
    /// Field used for "by id" lookups instead of `_id`
    pub id_field: String,
    pub connect_mode: ConnectMode,
    /// Reconnect on the next operation after `close()`
    pub auto_reconnect: bool,
    /// Ping the server whenever a driver client is created
    pub verify_connection: bool,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub app_name: Option<String>,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_url: DEFAULT_URL.to_string(),
            database_name: DEFAULT_DATABASE.to_string(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            connect_mode: ConnectMode::default(),
            auto_reconnect: true,
            verify_connection: true,
            connect_timeout_ms: None,
            server_selection_timeout_ms: None,
            app_name: None,
            max_pool_size: None,
            min_pool_size: None,
        }
    }
}

impl ClientConfig {
    pub fn new(connection_url: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            connection_url: connection_url.into(),
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_connect_mode(mut self, mode: ConnectMode) -> Self {
        self.connect_mode = mode;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_verify_connection(mut self, enabled: bool) -> Self {
        self.verify_connection = enabled;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    pub fn with_min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Read configuration from `DOCBRIDGE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DOCBRIDGE_URL") {
            config.connection_url = url;
        }
        if let Some(db) = lookup("DOCBRIDGE_DATABASE") {
            config.database_name = db;
        }
        if let Some(field) = lookup("DOCBRIDGE_ID_FIELD") {
            config.id_field = field;
        }
        if let Some(mode) = lookup("DOCBRIDGE_CONNECT_MODE") {
            config.connect_mode = mode.parse()?;
        }
        if let Some(flag) = lookup("DOCBRIDGE_AUTO_RECONNECT") {
            config.auto_reconnect = parse_env("DOCBRIDGE_AUTO_RECONNECT", &flag)?;
        }
        if let Some(ms) = lookup("DOCBRIDGE_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = Some(parse_env("DOCBRIDGE_CONNECT_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("DOCBRIDGE_SERVER_SELECTION_TIMEOUT_MS") {
            config.server_selection_timeout_ms =
                Some(parse_env("DOCBRIDGE_SERVER_SELECTION_TIMEOUT_MS", &ms)?);
        }
        if let Some(name) = lookup("DOCBRIDGE_APP_NAME") {
            config.app_name = Some(name);
        }

        Ok(config)
    }

    /// Load a JSON configuration file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.connection_url.trim();
        if url.is_empty() {
            return Err(DocBridgeError::Config("connection url must not be empty".into()));
        }
        if !(url.starts_with("mongodb://") || url.starts_with("mongodb+srv://")) {
            return Err(DocBridgeError::Config(format!(
                "connection url must start with mongodb:// or mongodb+srv://, got '{}'",
                url
            )));
        }
        if self.database_name.trim().is_empty() {
            return Err(DocBridgeError::Config("database name must not be empty".into()));
        }
        if self.id_field.trim().is_empty() {
            return Err(DocBridgeError::Config("id field must not be empty".into()));
        }
        if self.id_field.starts_with('$') {
            return Err(DocBridgeError::Config(format!(
                "id field '{}' must not start with '$'",
                self.id_field
            )));
        }
        if let (Some(min), Some(max)) = (self.min_pool_size, self.max_pool_size) {
            if min > max {
                return Err(DocBridgeError::Config(format!(
                    "min pool size {} exceeds max pool size {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Parse the connection url and overlay the optional settings.
    pub async fn client_options(&self) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(self.connection_url.trim()).await?;
        self.apply_to(&mut options);
        Ok(options)
    }

    fn apply_to(&self, options: &mut ClientOptions) {
        if let Some(ms) = self.connect_timeout_ms {
            options.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.server_selection_timeout_ms {
            options.server_selection_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(name) = &self.app_name {
            options.app_name = Some(name.clone());
        }
        if let Some(size) = self.max_pool_size {
            options.max_pool_size = Some(size);
        }
        if let Some(size) = self.min_pool_size {
            options.min_pool_size = Some(size);
        }
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DocBridgeError::Config(format!("invalid value '{}' for {}", raw, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connection_url, DEFAULT_URL);
        assert_eq!(config.database_name, "test");
        assert_eq!(config.id_field, "id");
        assert_eq!(config.connect_mode, ConnectMode::Lazy);
        assert!(config.auto_reconnect);
        assert!(config.verify_connection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("mongodb://example.com:27017", "mydb")
            .with_id_field("_id")
            .with_connect_mode(ConnectMode::Eager)
            .with_auto_reconnect(false)
            .with_connect_timeout(Duration::from_secs(2))
            .with_server_selection_timeout(Duration::from_millis(500))
            .with_app_name("billing")
            .with_max_pool_size(20)
            .with_min_pool_size(2);

        assert_eq!(config.connection_url, "mongodb://example.com:27017");
        assert_eq!(config.database_name, "mydb");
        assert_eq!(config.id_field, "_id");
        assert_eq!(config.connect_mode, ConnectMode::Eager);
        assert!(!config.auto_reconnect);
        assert_eq!(config.connect_timeout_ms, Some(2000));
        assert_eq!(config.server_selection_timeout_ms, Some(500));
        assert_eq!(config.app_name.as_deref(), Some("billing"));
        assert_eq!(config.max_pool_size, Some(20));
        assert_eq!(config.min_pool_size, Some(2));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_scheme = ClientConfig::new("http://localhost", "db");
        assert!(matches!(bad_scheme.validate(), Err(DocBridgeError::Config(_))));

        let empty_db = ClientConfig::new(DEFAULT_URL, "  ");
        assert!(empty_db.validate().is_err());

        let operator_field = ClientConfig::default().with_id_field("$id");
        assert!(operator_field.validate().is_err());

        let empty_field = ClientConfig::default().with_id_field("");
        assert!(empty_field.validate().is_err());

        let pools = ClientConfig::default()
            .with_min_pool_size(10)
            .with_max_pool_size(5);
        assert!(pools.validate().is_err());

        let srv = ClientConfig::new("mongodb+srv://cluster0.example.net", "db");
        assert!(srv.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCBRIDGE_URL", "mongodb://db.internal:27017"),
            ("DOCBRIDGE_DATABASE", "orders"),
            ("DOCBRIDGE_ID_FIELD", "order_id"),
            ("DOCBRIDGE_CONNECT_MODE", "Eager"),
            ("DOCBRIDGE_AUTO_RECONNECT", "false"),
            ("DOCBRIDGE_SERVER_SELECTION_TIMEOUT_MS", "1500"),
        ]);
        let config =
            ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.connection_url, "mongodb://db.internal:27017");
        assert_eq!(config.database_name, "orders");
        assert_eq!(config.id_field, "order_id");
        assert_eq!(config.connect_mode, ConnectMode::Eager);
        assert!(!config.auto_reconnect);
        assert_eq!(config.server_selection_timeout_ms, Some(1500));
        assert_eq!(config.connect_timeout_ms, None);
    }

    #[test]
    fn test_from_lookup_invalid_number() {
        let result = ClientConfig::from_lookup(|key| {
            (key == "DOCBRIDGE_CONNECT_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(DocBridgeError::Config(_))));

        let result = ClientConfig::from_lookup(|key| {
            (key == "DOCBRIDGE_CONNECT_MODE").then(|| "sometimes".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"connection_url": "mongodb://10.0.0.5:27017", "database_name": "inventory", "connect_mode": "eager"}}"#
        )
        .unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.connection_url, "mongodb://10.0.0.5:27017");
        assert_eq!(config.database_name, "inventory");
        assert_eq!(config.connect_mode, ConnectMode::Eager);
        assert_eq!(config.id_field, "id");
        assert!(config.auto_reconnect);
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = ClientConfig::from_json_file("/nonexistent/docbridge.json");
        assert!(matches!(result, Err(DocBridgeError::Io(_))));
    }

    #[tokio::test]
    async fn test_client_options_overlay() {
        let config = ClientConfig::new("mongodb://localhost:27017/?appName=fromurl", "db")
            .with_app_name("override")
            .with_connect_timeout(Duration::from_millis(750))
            .with_max_pool_size(8);

        let options = config.client_options().await.unwrap();
        assert_eq!(options.app_name.as_deref(), Some("override"));
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(750)));
        assert_eq!(options.max_pool_size, Some(8));
    }

    #[tokio::test]
    async fn test_client_options_ignores_surrounding_whitespace() {
        let config = ClientConfig::new("  mongodb://localhost:27017/?appName=padded \n", "db");
        assert!(config.validate().is_ok());

        let options = config.client_options().await.unwrap();
        assert_eq!(options.app_name.as_deref(), Some("padded"));
    }
}
