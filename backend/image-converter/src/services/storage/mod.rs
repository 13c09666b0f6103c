//! Object store access
//!
//! The pipeline only needs two operations against the store: read a whole
//! object and write a whole object, both addressed by bucket + key.
//! - `GcsClient` talks to Google Cloud Storage
//! - `MemoryStore` keeps objects in process, for tests and dry runs

pub mod gcs_client;
pub mod memory;

pub use gcs_client::GcsClient;
pub use memory::{MemoryStore, StoreOp};

use async_trait::async_trait;
use bytes::Bytes;

/// Failure reported by an object store implementation
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Client could not be initialized, authenticated or reach the store
    #[error("{0}")]
    Connect(String),

    #[error("object not found")]
    NotFound,

    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Write(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full contents of `bucket/key`
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Write `data` to `bucket/key`, returning once the store has committed it
    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
