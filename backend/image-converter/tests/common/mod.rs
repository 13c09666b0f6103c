//! Shared fixtures for integration tests
#![allow(dead_code)]

use image::codecs::webp::WebPEncoder;
use image::{ColorType, Rgba, RgbaImage};
use image_converter::config::ConversionConfig;
use std::time::Duration;

pub const FINALIZED: &str = "google.cloud.storage.object.v1.finalized";

/// Lossless WebP with a gradient, so decoding has real pixel data
pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .encode(img.as_raw(), width, height, ColorType::Rgba8)
        .expect("encode webp fixture");
    buf
}

/// Storage object data as the platform sends it
pub fn object_data(bucket: &str, key: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "storage#object",
        "bucket": bucket,
        "name": key,
        "generation": "1709296245123456",
        "metageneration": "1",
        "contentType": "image/webp",
        "size": "2048",
        "timeCreated": "2024-03-01T12:30:45.123Z",
        "updated": "2024-03-01T12:30:45.123Z"
    })
}

pub fn conversion_config(destination: Option<&str>) -> ConversionConfig {
    ConversionConfig {
        destination_bucket: destination.map(str::to_string),
        deadline: Duration::from_secs(10),
    }
}
