/// Data models for the conversion pipeline
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Decoded image held in memory between fetch and publish
pub type Image = image::DynamicImage;

/// Storage change notification decoded from an inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub event_id: String,
    pub event_type: String,
    /// Source bucket
    pub bucket: String,
    /// Source object key
    pub key: String,
    pub metageneration: i64,
    pub generation: i64,
    pub size: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Summary of a completed conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub event_id: String,
    pub source_bucket: String,
    pub source_key: String,
    pub destination_bucket: String,
    pub destination_key: String,
    pub width: u32,
    pub height: u32,
    pub bytes_written: usize,
}
