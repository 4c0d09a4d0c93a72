//! In-memory blob service client.
//!
//! Backs the test suite and the `memory` connection kind: containers
//! and blobs live in a process-local map, so operations can be
//! exercised without an Azure account.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::service::BlobServiceClient;
use crate::errors::ConnectorError;

/// Per-blob state: just the user metadata map.
type BlobMap = HashMap<String, HashMap<String, String>>;

/// In-memory blob service: container name -> blob name -> metadata.
#[derive(Debug, Default)]
pub struct MemoryBlobClient {
    containers: RwLock<HashMap<String, BlobMap>>,
}

impl MemoryBlobClient {
    /// Create an empty in-memory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container (setup helper, idempotent).
    pub fn create_container(&self, container: &str) {
        let mut containers = self.containers.write().expect("lock poisoned");
        containers.entry(container.to_string()).or_default();
    }

    /// Create a blob inside an existing container (setup helper).
    pub fn create_blob(&self, container: &str, blob: &str) {
        let mut containers = self.containers.write().expect("lock poisoned");
        if let Some(blobs) = containers.get_mut(container) {
            blobs.entry(blob.to_string()).or_default();
        }
    }

    /// Read back a blob's metadata map, if the blob exists.
    pub fn blob_metadata(&self, container: &str, blob: &str) -> Option<HashMap<String, String>> {
        let containers = self.containers.read().expect("lock poisoned");
        containers
            .get(container)
            .and_then(|blobs| blobs.get(blob))
            .cloned()
    }
}

impl BlobServiceClient for MemoryBlobClient {
    fn container_exists(
        &self,
        container: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>> {
        let container = container.to_string();
        Box::pin(async move {
            let containers = self.containers.read().expect("lock poisoned");
            Ok(containers.contains_key(&container))
        })
    }

    fn blob_exists(
        &self,
        container: &str,
        blob: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>> {
        let container = container.to_string();
        let blob = blob.to_string();
        Box::pin(async move {
            let containers = self.containers.read().expect("lock poisoned");
            Ok(containers
                .get(&container)
                .map(|blobs| blobs.contains_key(&blob))
                .unwrap_or(false))
        })
    }

    fn set_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConnectorError>> + Send + '_>> {
        let container = container.to_string();
        let blob = blob.to_string();
        let metadata = metadata.clone();
        Box::pin(async move {
            let mut containers = self.containers.write().expect("lock poisoned");
            let blobs = containers.get_mut(&container).ok_or_else(|| {
                ConnectorError::BlobStorage {
                    status: 404,
                    message: format!("The specified container does not exist: {}", container),
                }
            })?;
            let entry = blobs.get_mut(&blob).ok_or_else(|| ConnectorError::BlobStorage {
                status: 404,
                message: format!("The specified blob does not exist: {}", blob),
            })?;
            // Wholesale replacement, not a merge.
            *entry = metadata;
            Ok(())
        })
    }
}
