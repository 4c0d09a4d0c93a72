//! Azure Blob Storage connector library.
//!
//! This crate implements the upload-blob-metadata operation: replace
//! the user metadata of an existing blob in an existing container,
//! driven by a message context.  It provides the named-connection
//! registry that pools authenticated clients, the Azure Blob REST
//! client, the closed failure taxonomy, and the structured result
//! payload handed back to the host.

pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod metadata;
pub mod operations;
pub mod xml;

pub use connection::{Connection, ConnectionHandler, CONNECTOR_NAME};
pub use context::{HostError, MessageContext};
pub use errors::{ConnectorError, ErrorDescriptor};
pub use operations::upload_metadata::OperationOutcome;
