//! Image Converter
//!
//! Storage-triggered function that converts WebP objects to JPEG.
//! Each finalized object in the source bucket arrives as a CloudEvent; the
//! object is downloaded, re-encoded and written to the destination bucket.

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{ConvertError, Result};
