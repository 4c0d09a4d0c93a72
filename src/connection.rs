//! Named-connection registry and pool.
//!
//! Operations never build clients themselves: they ask the
//! [`ConnectionHandler`] for a named connection and borrow the handle
//! for the duration of one invocation.  Handles are constructed lazily
//! from configuration on first use and shared afterwards.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::client::azure::AzureBlobClient;
use crate::client::memory::MemoryBlobClient;
use crate::client::service::BlobServiceClient;
use crate::config::{ConnectionConfig, ConnectorConfig};
use crate::errors::ConnectorError;

/// Connector name used to scope pool entries.
pub const CONNECTOR_NAME: &str = "azureblob";

/// A pooled, pre-authenticated connection.
///
/// Connections are polymorphic over the capabilities their kind
/// provides; blob operations query the blob-service capability instead
/// of assuming it.
#[derive(Debug)]
pub struct Connection {
    name: String,
    blob_client: Option<Arc<dyn BlobServiceClient>>,
}

impl Connection {
    /// The connection's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blob-service capability of this connection.
    ///
    /// Fails with an `INVALID_CONFIGURATION` classification when the
    /// connection kind does not provide a blob service client.
    pub fn blob_service_client(&self) -> Result<Arc<dyn BlobServiceClient>, ConnectorError> {
        self.blob_client
            .clone()
            .ok_or_else(|| ConnectorError::InvalidConfiguration {
                message: format!(
                    "Connection '{}' does not provide a blob service client",
                    self.name
                ),
            })
    }
}

/// Registry of named connections, backed by configuration.
#[derive(Default)]
pub struct ConnectionHandler {
    configs: HashMap<String, ConnectionConfig>,
    pool: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionHandler {
    /// Create an empty registry (connections must be `register`ed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from loaded configuration.
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            configs: config.connections.clone(),
            pool: RwLock::new(HashMap::new()),
        }
    }

    /// Install a pre-built client under a connection name.
    pub fn register(
        &self,
        connector_name: &str,
        connection_name: &str,
        client: Arc<dyn BlobServiceClient>,
    ) {
        let key = Self::pool_key(connector_name, connection_name);
        let connection = Arc::new(Connection {
            name: connection_name.to_string(),
            blob_client: Some(client),
        });
        let mut pool = self.pool.write().expect("connection pool lock poisoned");
        pool.insert(key, connection);
    }

    /// Resolve a named connection, building it on first use.
    pub fn get_connection(
        &self,
        connector_name: &str,
        connection_name: &str,
    ) -> Result<Arc<Connection>, ConnectorError> {
        let key = Self::pool_key(connector_name, connection_name);

        {
            let pool = self.pool.read().expect("connection pool lock poisoned");
            if let Some(connection) = pool.get(&key) {
                return Ok(connection.clone());
            }
        }

        let config = self.configs.get(connection_name).ok_or_else(|| {
            ConnectorError::InvalidConfiguration {
                message: format!("Connection '{}' is not defined", connection_name),
            }
        })?;

        let connection = Arc::new(Self::build_connection(connection_name, config)?);

        let mut pool = self.pool.write().expect("connection pool lock poisoned");
        // Another invocation may have built the same connection meanwhile.
        let entry = pool.entry(key).or_insert(connection);
        Ok(entry.clone())
    }

    /// Construct a connection from its configuration section.
    fn build_connection(
        name: &str,
        config: &ConnectionConfig,
    ) -> Result<Connection, ConnectorError> {
        let blob_client: Option<Arc<dyn BlobServiceClient>> = match config.kind.as_str() {
            "azure_storage" => {
                let azure = config.azure.as_ref().ok_or_else(|| {
                    ConnectorError::InvalidConfiguration {
                        message: format!(
                            "Connection '{}' is azure_storage but has no azure section",
                            name
                        ),
                    }
                })?;
                let client = AzureBlobClient::new(azure)?;
                info!("Azure connection initialized: name={} account={}", name, azure.account);
                Some(Arc::new(client))
            }
            "memory" => {
                info!("In-memory connection initialized: name={}", name);
                Some(Arc::new(MemoryBlobClient::new()))
            }
            // Kinds without blob-storage support still resolve; the
            // capability accessor reports them.
            _ => None,
        };

        Ok(Connection {
            name: name.to_string(),
            blob_client,
        })
    }

    fn pool_key(connector_name: &str, connection_name: &str) -> String {
        format!("{}:{}", connector_name, connection_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_from_yaml(yaml: &str) -> ConnectionHandler {
        let config: ConnectorConfig = serde_yaml::from_str(yaml).unwrap();
        ConnectionHandler::from_config(&config)
    }

    #[test]
    fn test_unknown_connection_is_configuration_error() {
        let handler = ConnectionHandler::new();
        let err = handler.get_connection(CONNECTOR_NAME, "nope").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_memory_connection_provides_blob_capability() {
        let handler = handler_from_yaml("connections:\n  mem:\n    kind: memory\n");
        let connection = handler.get_connection(CONNECTOR_NAME, "mem").unwrap();
        assert_eq!(connection.name(), "mem");
        assert!(connection.blob_service_client().is_ok());
    }

    #[test]
    fn test_connections_are_pooled() {
        let handler = handler_from_yaml("connections:\n  mem:\n    kind: memory\n");
        let first = handler.get_connection(CONNECTOR_NAME, "mem").unwrap();
        let second = handler.get_connection(CONNECTOR_NAME, "mem").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_azure_kind_without_section_is_configuration_error() {
        let handler = handler_from_yaml("connections:\n  a:\n    kind: azure_storage\n");
        let err = handler.get_connection(CONNECTOR_NAME, "a").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_unsupported_kind_lacks_capability() {
        let handler = handler_from_yaml("connections:\n  q:\n    kind: queue_storage\n");
        let connection = handler.get_connection(CONNECTOR_NAME, "q").unwrap();
        let err = connection.blob_service_client().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_register_installs_prebuilt_client() {
        let handler = ConnectionHandler::new();
        handler.register(CONNECTOR_NAME, "test", Arc::new(MemoryBlobClient::new()));
        let connection = handler.get_connection(CONNECTOR_NAME, "test").unwrap();
        assert!(connection.blob_service_client().is_ok());
    }
}
