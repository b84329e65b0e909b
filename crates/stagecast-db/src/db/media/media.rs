use bytes::Bytes;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use stagecast_core::ids::validate_extension;
use stagecast_core::models::{Media, MediaImageMetadata, NewMedia};
use stagecast_core::{AppError, MediaId, MediaName};
use stagecast_infra::{retry_with_backoff, RetryPolicy};
use stagecast_storage::{ResumableUploads, Storage, StorageError};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::dependency::DependencyRepository;
use super::metadata::MediaMetadataRepository;

const MEDIA_COLUMNS: &str = r#"
    id, extension, file_size, file_offset, original_name, organization_id,
    creator_user_id, is_complete, is_user_uploaded, created_at, updated_at
"#;

/// Bytes handed to [`MediaRepository::upload_media`].
#[derive(Debug, Clone)]
pub enum MediaSource {
    Bytes(Bytes),
    /// Streamed from disk; used for transcoder output and mirrored downloads.
    File(PathBuf),
}

/// Media rows and their blobs.
///
/// Every write goes to the blob backend first and to the row second, so a
/// backend failure leaves the row as it was.
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
    storage: Arc<dyn Storage>,
    uploads: ResumableUploads,
    dependencies: DependencyRepository,
    metadata: MediaMetadataRepository,
    upload_policy: RetryPolicy,
}

impl MediaRepository {
    pub fn new(pool: PgPool, storage: Arc<dyn Storage>, uploads: ResumableUploads) -> Self {
        Self {
            dependencies: DependencyRepository::new(pool.clone()),
            metadata: MediaMetadataRepository::new(pool.clone()),
            pool,
            storage,
            uploads,
            upload_policy: RetryPolicy::default(),
        }
    }

    /// Override the attempt budget of `upload_media`.
    pub fn with_upload_policy(mut self, policy: RetryPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    #[tracing::instrument(skip(self), fields(db.table = "medias", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: MediaId) -> Result<Option<Media>, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM medias WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(media)
    }

    /// Look up by any accepted identifier form.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Media>, AppError> {
        let id = MediaId::resolve(name)?;
        self.get(id).await
    }

    pub async fn get_many(&self, ids: &[MediaId]) -> Result<Vec<Media>, AppError> {
        let ids: Vec<Uuid> = ids.iter().map(MediaId::as_uuid).collect();
        let rows = sqlx::query_as::<Postgres, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM medias WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The subset of `ids` that has a local row.
    pub async fn existing_ids(&self, ids: &[MediaId]) -> Result<HashSet<MediaId>, AppError> {
        let ids: Vec<Uuid> = ids.iter().map(MediaId::as_uuid).collect();
        let rows: Vec<(MediaId,)> = sqlx::query_as("SELECT id FROM medias WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Create the row for a resumable upload, or return the existing one.
    ///
    /// Resuming an upload with a different extension is rejected.
    #[tracing::instrument(skip(self, new), fields(db.table = "medias", db.operation = "insert", db.record_id = %new.id))]
    pub async fn begin_upload(&self, new: NewMedia) -> Result<Media, AppError> {
        validate_extension(&new.extension)?;
        let name = new.media_name().to_string();
        if let Some(existing) = self.get(new.id).await? {
            ensure_same_extension(&existing, &new)?;
            if existing.is_complete {
                return Ok(existing);
            }
        }
        let staged = self.uploads.create(&name).await?;

        sqlx::query(
            r#"
            INSERT INTO medias (
                id, extension, file_size, file_offset, original_name, organization_id,
                creator_user_id, is_complete, is_user_uploaded, created_at
            )
            VALUES ($1, $2, $3, 0, $4, $5, $6, FALSE, $7, COALESCE($8, NOW()))
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(new.id)
        .bind(&new.extension)
        .bind(new.file_size)
        .bind(&new.original_name)
        .bind(new.organization_id)
        .bind(new.creator_user_id)
        .bind(new.is_user_uploaded)
        .bind(new.created_at)
        .execute(&self.pool)
        .await?;

        let media = self
            .get(new.id)
            .await?
            .ok_or_else(|| AppError::media_not_found(&name))?;

        ensure_same_extension(&media, &new)?;
        if media.is_complete || media.file_offset == staged as i64 {
            return Ok(media);
        }

        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "UPDATE medias SET file_offset = $2, updated_at = NOW() WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(new.id)
        .bind(staged as i64)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(media_name = %name, offset = staged, "Upload started");
        Ok(media)
    }

    /// Bytes received so far for `upload_id`.
    pub async fn upload_offset(&self, upload_id: &str) -> Result<i64, AppError> {
        let name: MediaName = upload_id.parse()?;
        let media = self
            .get(name.id)
            .await?
            .ok_or_else(|| AppError::media_not_found(upload_id))?;
        Ok(media.file_offset)
    }

    /// Append a chunk at `offset` and record the new offset.
    #[tracing::instrument(skip(self, data), fields(db.table = "medias", db.operation = "update", chunk_bytes = data.len()))]
    pub async fn write_chunk(&self, upload_id: &str, offset: u64, data: Bytes) -> Result<Media, AppError> {
        let name: MediaName = upload_id.parse()?;
        let media = self
            .get(name.id)
            .await?
            .ok_or_else(|| AppError::media_not_found(upload_id))?;
        if media.is_complete {
            return Err(AppError::Conflict(format!("Upload {} is already complete", upload_id)));
        }

        let new_offset = self.uploads.write_chunk(upload_id, offset, data).await?;

        let media = sqlx::query_as::<Postgres, Media>(&format!(
            "UPDATE medias SET file_offset = $2, updated_at = NOW() WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(name.id)
        .bind(new_offset as i64)
        .fetch_one(&self.pool)
        .await?;

        Ok(media)
    }

    /// Finish a resumable upload: move the staged bytes into the backend and
    /// mark the row complete. Completing a complete media returns it as is.
    #[tracing::instrument(skip(self), fields(db.table = "medias", db.operation = "update"))]
    pub async fn complete_media(&self, media_name: &str) -> Result<Media, AppError> {
        let id = MediaId::resolve(media_name)?;
        let media = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::media_not_found(media_name))?;
        if media.is_complete {
            return Ok(media);
        }

        let object_name = media.media_name().to_string();
        let size = retry_with_backoff(
            RetryPolicy::short(),
            "complete_media",
            StorageError::is_transient,
            |_| self.uploads.finish(&object_name, self.storage.as_ref()),
        )
        .await?;

        if media.is_image() {
            match self.storage.download(&object_name).await {
                Ok(bytes) => self.record_image_dimensions(id, &bytes).await,
                Err(e) => tracing::warn!(error = %e, media_name = %object_name, "Could not read image for dimensions"),
            }
        }

        let media = sqlx::query_as::<Postgres, Media>(&format!(
            r#"
            UPDATE medias
            SET is_complete = TRUE, file_size = $2, file_offset = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(size as i64)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(media_name = %object_name, size_bytes = size, "Media upload completed");
        Ok(media)
    }

    /// One-shot upload: write the whole object, then create or refresh the
    /// row with `is_complete = true`. The whole cycle is retried.
    #[tracing::instrument(skip(self, source, new), fields(db.table = "medias", db.operation = "insert", db.record_id = %new.id))]
    pub async fn upload_media(&self, source: MediaSource, new: NewMedia) -> Result<Media, AppError> {
        validate_extension(&new.extension)?;
        let name = new.media_name().to_string();

        let media = retry_with_backoff(
            self.upload_policy,
            "upload_media",
            is_retryable,
            |attempt| {
                let source = source.clone();
                let new = new.clone();
                let name = name.clone();
                async move {
                    if attempt > 1 {
                        tracing::info!(media_name = %name, attempt = attempt, "Retrying media upload");
                    }
                    let size = self.write_blob(&name, source).await?;
                    self.upsert_complete(&new, size).await
                }
            },
        )
        .await?;

        if media.is_image() {
            let bytes = match source {
                MediaSource::Bytes(bytes) => Some(bytes),
                MediaSource::File(path) => tokio::fs::read(&path).await.ok().map(Bytes::from),
            };
            if let Some(bytes) = bytes {
                self.record_image_dimensions(media.id, &bytes).await;
            }
        }

        tracing::debug!(media_name = %name, size_bytes = ?media.file_size, "Media uploaded");
        Ok(media)
    }

    async fn write_blob(&self, name: &str, source: MediaSource) -> Result<u64, AppError> {
        match source {
            MediaSource::Bytes(bytes) => {
                let len = bytes.len() as u64;
                self.storage.upload(name, bytes).await?;
                Ok(len)
            }
            MediaSource::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let len = file.metadata().await?.len();
                Ok(self.storage.upload_stream(name, Some(len), Box::pin(file)).await?)
            }
        }
    }

    async fn upsert_complete(&self, new: &NewMedia, size: u64) -> Result<Media, AppError> {
        let media = sqlx::query_as::<Postgres, Media>(&format!(
            r#"
            INSERT INTO medias (
                id, extension, file_size, file_offset, original_name, organization_id,
                creator_user_id, is_complete, is_user_uploaded, created_at
            )
            VALUES ($1, $2, $3, $3, $4, $5, $6, TRUE, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET file_size = EXCLUDED.file_size,
                file_offset = EXCLUDED.file_offset,
                is_complete = TRUE,
                updated_at = NOW()
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(&new.extension)
        .bind(size as i64)
        .bind(&new.original_name)
        .bind(new.organization_id)
        .bind(new.creator_user_id)
        .bind(new.is_user_uploaded)
        .bind(new.created_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await?;

        Ok(media)
    }

    /// Header probe only; failures are logged.
    async fn record_image_dimensions(&self, id: MediaId, bytes: &[u8]) {
        let dimensions = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()));

        match dimensions {
            Ok((width, height)) => {
                let row = MediaImageMetadata {
                    image_media_id: id,
                    width: width as i32,
                    height: height as i32,
                };
                if let Err(e) = self.metadata.upsert_image_metadata(&row).await {
                    tracing::warn!(error = %e, media_id = %id, "Failed to store image dimensions");
                }
            }
            Err(e) => tracing::warn!(error = %e, media_id = %id, "Could not read image dimensions"),
        }
    }

    /// Delete a media and every transitive descendant.
    ///
    /// Blobs go first, children before parents, each retried and logged on
    /// failure. Rows are then removed in a single transaction. Returns the
    /// ids whose rows were deleted; an absent media yields an empty list.
    #[tracing::instrument(skip(self), fields(db.table = "medias", db.operation = "delete"))]
    pub async fn delete_media(&self, media_name: &str) -> Result<Vec<MediaId>, AppError> {
        let root = MediaId::resolve(media_name)?;
        if self.get(root).await?.is_none() {
            tracing::debug!(media_name = %media_name, "Media already absent");
            return Ok(Vec::new());
        }

        let closure = self.dependencies.closure(&[root]).await?;
        let rows = self.get_many(&closure).await?;
        let by_id: std::collections::HashMap<MediaId, &Media> =
            rows.iter().map(|m| (m.id, m)).collect();

        for id in closure.iter().rev() {
            let Some(media) = by_id.get(id) else {
                continue;
            };
            let name = media.media_name().to_string();
            let deleted = retry_with_backoff(
                RetryPolicy::short(),
                "delete_blob",
                StorageError::is_transient,
                |_| self.storage.delete(&name),
            )
            .await;
            if let Err(e) = deleted {
                tracing::error!(error = %e, media_name = %name, "Failed to delete blob, removing row anyway");
            }
            if let Err(e) = self.uploads.discard(&name).await {
                tracing::warn!(error = %e, media_name = %name, "Failed to discard staged upload");
            }
        }

        let ids: Vec<Uuid> = closure.iter().map(MediaId::as_uuid).collect();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM medias WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            media_id = %root,
            descendants = closure.len() - 1,
            rows_deleted = result.rows_affected(),
            "Media deleted with descendants"
        );
        Ok(closure)
    }

    /// Alias for [`delete_media`](Self::delete_media) taking an id.
    pub async fn cascade_delete(&self, id: MediaId) -> Result<Vec<MediaId>, AppError> {
        self.delete_media(&id.to_string()).await
    }
}

fn ensure_same_extension(media: &Media, new: &NewMedia) -> Result<(), AppError> {
    if media.extension != new.extension {
        return Err(AppError::InvalidInput(format!(
            "Upload {} already exists with extension {}",
            new.id, media.extension
        )));
    }
    Ok(())
}

fn is_retryable(err: &AppError) -> bool {
    matches!(err, AppError::Storage(_) | AppError::Database(_) | AppError::Internal(_))
}
