//! In-process object store
//!
//! Keeps objects in a map and records every operation, so callers can
//! assert exactly which reads and writes a conversion performed.

use super::{ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Operation observed by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Read { bucket: String, key: String },
    Write { bucket: String, key: String },
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    ops: RwLock<Vec<StoreOp>>,
    latency: Option<Duration>,
    write_latency: Option<Duration>,
    write_failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation, to exercise deadlines
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay writes only, after the write is recorded but before it lands
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = Some(latency);
        self
    }

    /// Fail every write with the given reason
    pub fn with_write_failure(mut self, reason: impl Into<String>) -> Self {
        self.write_failure = Some(reason.into());
        self
    }

    pub async fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: &str,
    ) {
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every operation attempted so far, in order
    pub async fn operations(&self) -> Vec<StoreOp> {
        self.ops.read().await.clone()
    }

    pub async fn writes(&self) -> Vec<StoreOp> {
        self.ops
            .read()
            .await
            .iter()
            .filter(|op| matches!(op, StoreOp::Write { .. }))
            .cloned()
            .collect()
    }

    async fn record(&self, op: StoreOp) {
        self.ops.write().await.push(op);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        self.record(StoreOp::Read {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
        .await;

        self.get(bucket, key)
            .await
            .map(|object| object.data)
            .ok_or(StorageError::NotFound)
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.record(StoreOp::Write {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
        .await;
        if let Some(latency) = self.write_latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(reason) = &self.write_failure {
            return Err(StorageError::Write(reason.clone()));
        }

        self.insert(bucket, key, data, content_type).await;
        Ok(())
    }
}
