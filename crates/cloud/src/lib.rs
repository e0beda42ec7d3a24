//! S3-compatible artifact storage.

pub mod config;
pub mod s3;

pub use config::StorageConfig;
pub use s3::{S3ArtifactStore, StorageError};
