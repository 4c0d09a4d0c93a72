//! Configuration loading and types for the connector.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`ConnectorConfig`] struct.  It names the pooled connections the
//! registry can hand out, plus logging settings for the CLI driver.
//!
//! ```yaml
//! logging:
//!   level: info
//! connections:
//!   primary:
//!     kind: azure_storage
//!     azure:
//!       account: myaccount
//!       account_key: "bWFnaWM="
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Named connection definitions.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One named connection definition.
///
/// `kind` selects the client implementation; the matching section
/// carries its settings.  Connections of a kind with no blob-storage
/// client cannot be used by blob operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Connection kind: `azure_storage` or `memory`.
    #[serde(default = "default_connection_kind")]
    pub kind: String,

    /// Azure Blob Storage settings (required when kind is `azure_storage`).
    #[serde(default)]
    pub azure: Option<AzureConnectionConfig>,
}

/// Azure Blob Storage connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureConnectionConfig {
    /// Azure storage account name.
    #[serde(default)]
    pub account: String,

    /// Endpoint override (e.g. Azurite `http://127.0.0.1:10000/account`).
    #[serde(default)]
    pub endpoint: String,

    /// Base64 storage account key (Shared Key auth).
    #[serde(default)]
    pub account_key: String,

    /// Alternative to `account_key`: full connection string.
    #[serde(default)]
    pub connection_string: String,

    /// SAS token auth.
    #[serde(default)]
    pub sas_token: String,

    /// Azure AD tenant for client-credentials auth.
    #[serde(default)]
    pub tenant_id: String,

    /// Azure AD application (client) ID.
    #[serde(default)]
    pub client_id: String,

    /// Azure AD client secret.
    #[serde(default)]
    pub client_secret: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_connection_kind() -> String {
    "azure_storage".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<ConnectorConfig> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: ConnectorConfig = serde_yaml::from_str(&contents)?;
    Ok(config)
}
