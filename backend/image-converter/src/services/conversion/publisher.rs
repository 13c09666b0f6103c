//! Object publisher - encodes the image and uploads it

use super::codec::{ImageCodec, JPEG_CONTENT_TYPE};
use crate::error::{ConvertError, Result};
use crate::models::Image;
use crate::services::storage::{ObjectStore, StorageError};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ObjectPublisher {
    store: Arc<dyn ObjectStore>,
    codec: ImageCodec,
}

impl ObjectPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, codec: ImageCodec) -> Self {
        Self { store, codec }
    }

    /// Encode `image` as JPEG and write it to `bucket/key`
    ///
    /// Encoding finishes before the write is opened, so an encoder failure
    /// never leaves a partial object behind. The store's answer to the
    /// upload is checked; a rejected upload is a `StorageWrite` error.
    /// Returns the number of bytes written.
    pub async fn publish(&self, bucket: &str, key: &str, image: Arc<Image>) -> Result<usize> {
        let codec = self.codec;
        let encode_error = |reason: String| ConvertError::EncodeImage {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let data = tokio::task::spawn_blocking(move || codec.encode_jpeg(&image))
            .await
            .map_err(|e| encode_error(format!("encode task panicked: {e}")))?
            .map_err(|e| encode_error(e.to_string()))?;

        let size = data.len();
        self.store
            .write_object(bucket, key, data, JPEG_CONTENT_TYPE)
            .await
            .map_err(|e| match e {
                StorageError::Connect(reason) => ConvertError::StorageConnect {
                    operation: "write",
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason,
                },
                other => ConvertError::StorageWrite {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: other.to_string(),
                },
            })?;

        info!(bucket = %bucket, key = %key, size, "Published converted image");
        Ok(size)
    }
}
