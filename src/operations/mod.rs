//! Connector operations.

pub mod upload_metadata;
