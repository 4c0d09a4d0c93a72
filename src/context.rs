//! Message context passed between the host framework and the operation.
//!
//! The host invokes the connector with a property bag carrying the
//! request parameters and expects the structured result payload (plus
//! error properties on failure) attached to the same context.

use std::collections::HashMap;
use thiserror::Error;

use crate::errors::ErrorDescriptor;

/// Context property holding the target container name.
pub const CONTAINER_NAME: &str = "containerName";
/// Context property holding the target blob name.
pub const FILE_NAME: &str = "fileName";
/// Context property holding the JSON-encoded metadata map.
pub const METADATA: &str = "metadata";
/// Context property naming the pooled connection to use.
pub const CONNECTION_NAME: &str = "connectionName";

/// Outbound property for the classified error code.
pub const ERROR_CODE: &str = "ERROR_CODE";
/// Outbound property for the error detail message.
pub const ERROR_MESSAGE: &str = "ERROR_MESSAGE";

/// Signal returned to the host framework when an operation cannot
/// complete normally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// The operation failed but a structured response was attached;
    /// the host may continue its fault sequence.
    #[error("{0}")]
    Recoverable(String),

    /// No structured response could be produced at all.
    #[error("{0}")]
    Fatal(String),
}

/// Request/response property bag.
#[derive(Debug, Default)]
pub struct MessageContext {
    properties: HashMap<String, String>,
    payload: Option<String>,
}

impl MessageContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a property by key.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Set a property, replacing any previous value.
    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    /// Attach the classified error code and detail for a failing
    /// invocation.
    pub fn set_error_properties(&mut self, descriptor: &ErrorDescriptor) {
        self.properties
            .insert(ERROR_CODE.to_string(), descriptor.code().to_string());
        self.properties
            .insert(ERROR_MESSAGE.to_string(), descriptor.detail().to_string());
    }

    /// Attach the operation's structured result payload.
    pub fn set_payload(&mut self, payload: String) {
        self.payload = Some(payload);
    }

    /// The attached result payload, if any.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}
