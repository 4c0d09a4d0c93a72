//! Abstract blob service client trait.
//!
//! The operation controller talks to the storage service only through
//! [`BlobServiceClient`], so the remote wire protocol stays behind one
//! seam.  Every method classifies its failures into [`ConnectorError`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::ConnectorError;

/// Async blob service contract.
pub trait BlobServiceClient: std::fmt::Debug + Send + Sync + 'static {
    /// Check whether the named container exists.
    fn container_exists(
        &self,
        container: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>>;

    /// Check whether `blob` exists inside `container`.
    fn blob_exists(
        &self,
        container: &str,
        blob: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>>;

    /// Replace the blob's user metadata wholesale with `metadata`.
    ///
    /// This is not a merge: keys absent from `metadata` are removed
    /// from the blob.
    fn set_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConnectorError>> + Send + '_>>;
}
