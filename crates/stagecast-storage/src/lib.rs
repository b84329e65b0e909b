//! Stagecast Storage Library
//!
//! Blob backends addressed by media name (`{media_id}.{extension}`), plus the
//! staging area that backs resumable uploads.
//!
//! # Storage key format
//!
//! Every backend stores a media under `media/{media_name}`. Key generation is
//! centralized in the `keys` module so backends stay interchangeable.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod uploads;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::ObjectStorage;
pub use stagecast_core::StorageBackend;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
pub use uploads::ResumableUploads;
