//! Staging area for resumable uploads.
//!
//! Chunks are appended to a staging file named after the upload id (the media
//! name). The file length is the authoritative offset: a chunk is accepted
//! only when it starts exactly where the staged bytes end. On finish the
//! staged file is streamed into the active [`Storage`] backend and removed.

use crate::keys::validate_name;
use crate::traits::{Storage, StorageError, StorageResult};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone)]
pub struct ResumableUploads {
    staging_dir: PathBuf,
}

impl ResumableUploads {
    pub async fn new(staging_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let staging_dir = staging_dir.into();
        fs::create_dir_all(&staging_dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload staging directory {}: {}",
                staging_dir.display(),
                e
            ))
        })?;
        Ok(Self { staging_dir })
    }

    fn staged_path(&self, upload_id: &str) -> StorageResult<PathBuf> {
        validate_name(upload_id)?;
        Ok(self.staging_dir.join(format!("{}.part", upload_id)))
    }

    /// Create an empty staging file, or keep the existing one when resuming.
    /// Returns the current offset.
    pub async fn create(&self, upload_id: &str) -> StorageResult<u64> {
        let path = self.staged_path(upload_id)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(file.metadata().await?.len())
    }

    /// Bytes staged so far.
    pub async fn offset(&self, upload_id: &str) -> StorageResult<u64> {
        let path = self.staged_path(upload_id)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(upload_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append `data` at `offset`. Returns the new offset.
    pub async fn write_chunk(&self, upload_id: &str, offset: u64, data: Bytes) -> StorageResult<u64> {
        let current = self.offset(upload_id).await?;
        if current != offset {
            return Err(StorageError::OffsetMismatch {
                expected: current,
                actual: offset,
            });
        }

        let path = self.staged_path(upload_id)?;
        let mut file = fs::OpenOptions::new().append(true).open(&path).await?;
        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to append to {}: {}", path.display(), e))
        })?;
        file.sync_all().await?;

        let new_offset = offset + data.len() as u64;
        tracing::debug!(
            upload_id = %upload_id,
            offset = offset,
            chunk_bytes = data.len(),
            new_offset = new_offset,
            "Upload chunk staged"
        );
        Ok(new_offset)
    }

    /// Move the staged bytes into `storage`. Returns the final size.
    ///
    /// When nothing is staged but the object already exists in the backend,
    /// a previous finish got through and the call succeeds with that size.
    pub async fn finish(&self, upload_id: &str, storage: &dyn Storage) -> StorageResult<u64> {
        let path = self.staged_path(upload_id)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if storage.exists(upload_id).await? {
                    tracing::info!(upload_id = %upload_id, "Upload already finished");
                    return storage.content_length(upload_id).await;
                }
                return Err(StorageError::NotFound(upload_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        let written = storage
            .upload_stream(upload_id, Some(len), Box::pin(file))
            .await?;
        self.discard(upload_id).await?;

        tracing::info!(upload_id = %upload_id, size_bytes = written, "Upload finished");
        Ok(written)
    }

    /// Drop staged bytes. Missing staging files are ignored.
    pub async fn discard(&self, upload_id: &str) -> StorageResult<()> {
        let path = self.staged_path(upload_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_chunks_then_finish() {
        let dir = tempdir().unwrap();
        let uploads = ResumableUploads::new(dir.path().join("staging")).await.unwrap();
        let storage = LocalStorage::new(dir.path().join("blobs"), "/media/data".into())
            .await
            .unwrap();

        assert_eq!(uploads.create("media_a.bin").await.unwrap(), 0);
        let offset = uploads
            .write_chunk("media_a.bin", 0, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        assert_eq!(offset, 6);
        let offset = uploads
            .write_chunk("media_a.bin", 6, Bytes::from_static(b"world"))
            .await
            .unwrap();
        assert_eq!(offset, 11);

        let size = uploads.finish("media_a.bin", &storage).await.unwrap();
        assert_eq!(size, 11);
        assert_eq!(storage.download("media_a.bin").await.unwrap(), "hello world");
        assert!(uploads.offset("media_a.bin").await.is_err());
    }

    #[tokio::test]
    async fn test_resume_keeps_offset() {
        let dir = tempdir().unwrap();
        let uploads = ResumableUploads::new(dir.path()).await.unwrap();
        uploads.create("media_r.bin").await.unwrap();
        uploads
            .write_chunk("media_r.bin", 0, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(uploads.create("media_r.bin").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_offset_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let uploads = ResumableUploads::new(dir.path()).await.unwrap();
        uploads.create("media_m.bin").await.unwrap();
        let err = uploads
            .write_chunk("media_m.bin", 5, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::OffsetMismatch {
                expected: 0,
                actual: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_finish_twice_succeeds() {
        let dir = tempdir().unwrap();
        let uploads = ResumableUploads::new(dir.path().join("staging")).await.unwrap();
        let storage = LocalStorage::new(dir.path().join("blobs"), "/media/data".into())
            .await
            .unwrap();
        uploads.create("media_t.bin").await.unwrap();
        uploads
            .write_chunk("media_t.bin", 0, Bytes::from_static(b"1234"))
            .await
            .unwrap();
        uploads.finish("media_t.bin", &storage).await.unwrap();
        assert_eq!(uploads.finish("media_t.bin", &storage).await.unwrap(), 4);
    }
}
