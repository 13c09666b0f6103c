//! WebP -> JPEG conversion pipeline
//!
//! This module provides the per-event conversion workflow:
//! - Fetcher for downloading and decoding the source image
//! - Publisher for encoding and uploading the converted image
//! - Service for driving one event from start to finish

pub mod codec;
pub mod deadline;
pub mod fetcher;
pub mod naming;
pub mod publisher;
pub mod service;

pub use codec::{ImageCodec, JPEG_QUALITY};
pub use deadline::{within_deadline, Stage};
pub use fetcher::ObjectFetcher;
pub use naming::{derive_destination_key, TARGET_EXTENSION};
pub use publisher::ObjectPublisher;
pub use service::{ConversionService, PipelineState};
