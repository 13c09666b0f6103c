//! Image codec pair - WebP in, JPEG out
//!
//! Both directions are CPU-bound; callers in async code run them on the
//! blocking pool (see `ObjectFetcher` and `ObjectPublisher`).

use crate::models::Image;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, ImageFormat, ImageResult};
use tracing::debug;

/// JPEG quality used for every converted image
pub const JPEG_QUALITY: u8 = 100;

/// Content type written alongside converted objects
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone, Copy, Debug)]
pub struct ImageCodec {
    quality: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(JPEG_QUALITY)
    }
}

impl ImageCodec {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    /// Decode WebP bytes into an in-memory image
    pub fn decode_webp(&self, data: &[u8]) -> ImageResult<Image> {
        let img = image::load_from_memory_with_format(data, ImageFormat::WebP)?;
        let (width, height) = img.dimensions();
        debug!(width, height, size = data.len(), "Decoded webp");
        Ok(img)
    }

    /// Encode an image as JPEG
    ///
    /// JPEG has no alpha channel, so the image is flattened to RGB first.
    pub fn encode_jpeg(&self, img: &Image) -> ImageResult<Bytes> {
        let rgb = img.to_rgb8();
        let mut buf = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
            encoder.encode_image(&rgb)?;
        }

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            size = buf.len(),
            quality = self.quality,
            "Encoded jpeg"
        );
        Ok(Bytes::from(buf))
    }
}
