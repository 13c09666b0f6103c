//! Business logic for the image converter

pub mod conversion;
pub mod storage;

pub use conversion::{ConversionService, PipelineState};
pub use storage::{GcsClient, MemoryStore, ObjectStore, StorageError};
