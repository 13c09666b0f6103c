//! Object fetcher - downloads the source object and decodes it

use super::codec::ImageCodec;
use crate::error::{ConvertError, Result};
use crate::models::Image;
use crate::services::storage::{ObjectStore, StorageError};
use image::GenericImageView;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
    codec: ImageCodec,
}

impl ObjectFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, codec: ImageCodec) -> Self {
        Self { store, codec }
    }

    /// Read `bucket/key` and decode it as WebP
    ///
    /// The downloaded bytes are owned by this call and released on every
    /// exit path, including cancellation by the invocation deadline.
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<Image> {
        let data = self
            .store
            .read_object(bucket, key)
            .await
            .map_err(|e| match e {
                StorageError::Connect(reason) => ConvertError::StorageConnect {
                    operation: "read",
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason,
                },
                other => ConvertError::StorageRead {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let size = data.len();
        let codec = self.codec;
        let decode_error = |reason: String| ConvertError::DecodeImage {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let image = tokio::task::spawn_blocking(move || codec.decode_webp(&data))
            .await
            .map_err(|e| decode_error(format!("decode task panicked: {e}")))?
            .map_err(|e| decode_error(e.to_string()))?;

        let (width, height) = image.dimensions();
        info!(bucket = %bucket, key = %key, size, width, height, "Fetched source image");
        Ok(image)
    }
}
