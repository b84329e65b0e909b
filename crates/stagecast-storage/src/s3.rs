use crate::keys::{media_key, public_url};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Object storage backend (S3 and S3-compatible providers).
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_url: String,
}

impl ObjectStorage {
    /// Connect to an S3 bucket. Credentials come from the standard AWS
    /// environment variables; `endpoint_url` targets S3-compatible providers
    /// such as MinIO.
    pub fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        base_url: String,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            bucket,
            base_url,
        })
    }

    /// Wrap any object store, e.g. `object_store::memory::InMemory` in tests.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, base_url: String) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            base_url,
        }
    }

    fn location(media_name: &str) -> StorageResult<Path> {
        Ok(Path::from(media_key(media_name)?))
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn upload(&self, media_name: &str, data: Bytes) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Self::location(media_name)?;
        let size = data.len();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(data)).await;
        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                media_name = %media_name,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            media_name = %media_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage upload successful"
        );
        Ok(())
    }

    async fn upload_stream(
        &self,
        media_name: &str,
        content_length: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        // Single put; the whole object is buffered first.
        let mut buffer = Vec::with_capacity(content_length.unwrap_or(0) as usize);
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;
        let size = buffer.len() as u64;
        self.upload(media_name, Bytes::from(buffer)).await?;
        Ok(size)
    }

    async fn download(&self, media_name: &str) -> StorageResult<Bytes> {
        let location = Self::location(media_name)?;
        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(media_name.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn download_stream(&self, media_name: &str) -> StorageResult<ByteStream> {
        let location = Self::location(media_name)?;
        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(media_name.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();
        let name = media_name.to_string();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(bucket = %bucket, media_name = %name, error = %e, "Object storage stream error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, media_name: &str) -> StorageResult<()> {
        let location = Self::location(media_name)?;
        let result: ObjectResult<_> = self.store.delete(&location).await;
        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    media_name = %media_name,
                    "Object storage delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn exists(&self, media_name: &str) -> StorageResult<bool> {
        let location = Self::location(media_name)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, media_name: &str) -> StorageResult<u64> {
        let location = Self::location(media_name)?;
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(ObjectStoreError::NotFound { .. }) => {
                Err(StorageError::NotFound(media_name.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    fn public_url(&self, media_name: &str) -> String {
        public_url(&self.base_url, media_name)
    }
}
