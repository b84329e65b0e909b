use sqlx::{PgPool, Postgres};
use stagecast_core::models::{MediaImageMetadata, MediaImageSize, MediaVideoMetadata};
use stagecast_core::{AppError, MediaId};
use uuid::Uuid;

/// Facts recorded about media by the transcoder, the image pipeline and
/// the cloud mirror.
#[derive(Clone)]
pub struct MediaMetadataRepository {
    pool: PgPool,
}

impl MediaMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_video_metadata", db.operation = "select", db.record_id = %video_media_id))]
    pub async fn video_metadata(&self, video_media_id: MediaId) -> Result<Option<MediaVideoMetadata>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaVideoMetadata>(
            r#"
            SELECT video_media_id, hls_media_id, thumbnail_media_id, duration
            FROM media_video_metadata
            WHERE video_media_id = $1
            "#,
        )
        .bind(video_media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert-or-ignore. An existing row for the same video wins.
    #[tracing::instrument(skip(self, metadata), fields(db.table = "media_video_metadata", db.operation = "insert", db.record_id = %metadata.video_media_id))]
    pub async fn insert_video_metadata(&self, metadata: &MediaVideoMetadata) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO media_video_metadata (video_media_id, hls_media_id, thumbnail_media_id, duration)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (video_media_id) DO NOTHING
            "#,
        )
        .bind(metadata.video_media_id)
        .bind(metadata.hls_media_id)
        .bind(metadata.thumbnail_media_id)
        .bind(metadata.duration)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert-or-ignore a batch; rows referencing media not stored locally are skipped.
    pub async fn insert_video_metadata_many(&self, rows: &[MediaVideoMetadata]) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let videos: Vec<Uuid> = rows.iter().map(|r| r.video_media_id.as_uuid()).collect();
        let hls: Vec<Uuid> = rows.iter().map(|r| r.hls_media_id.as_uuid()).collect();
        let thumbs: Vec<Uuid> = rows.iter().map(|r| r.thumbnail_media_id.as_uuid()).collect();
        let durations: Vec<f64> = rows.iter().map(|r| r.duration).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO media_video_metadata (video_media_id, hls_media_id, thumbnail_media_id, duration)
            SELECT v.video, v.hls, v.thumb, v.duration
            FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::float8[]) AS v(video, hls, thumb, duration)
            WHERE EXISTS (SELECT 1 FROM medias WHERE id = v.video)
              AND EXISTS (SELECT 1 FROM medias WHERE id = v.hls)
              AND EXISTS (SELECT 1 FROM medias WHERE id = v.thumb)
            ON CONFLICT (video_media_id) DO NOTHING
            "#,
        )
        .bind(&videos)
        .bind(&hls)
        .bind(&thumbs)
        .bind(&durations)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert-or-ignore processed image sizes.
    #[tracing::instrument(skip(self, rows), fields(db.table = "media_image_sizes", db.operation = "insert", count = rows.len()))]
    pub async fn insert_image_sizes(&self, rows: &[MediaImageSize]) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let images: Vec<Uuid> = rows.iter().map(|r| r.image_media_id.as_uuid()).collect();
        let processed: Vec<Uuid> = rows.iter().map(|r| r.processed_media_id.as_uuid()).collect();
        let widths: Vec<i32> = rows.iter().map(|r| r.width).collect();
        let types: Vec<String> = rows.iter().map(|r| r.file_type.clone()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO media_image_sizes (image_media_id, processed_media_id, width, file_type)
            SELECT s.image, s.processed, s.width, s.file_type
            FROM UNNEST($1::uuid[], $2::uuid[], $3::int4[], $4::text[]) AS s(image, processed, width, file_type)
            WHERE EXISTS (SELECT 1 FROM medias WHERE id = s.image)
              AND EXISTS (SELECT 1 FROM medias WHERE id = s.processed)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&images)
        .bind(&processed)
        .bind(&widths)
        .bind(&types)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn image_sizes(&self, image_media_id: MediaId) -> Result<Vec<MediaImageSize>, AppError> {
        let rows = sqlx::query_as::<Postgres, MediaImageSize>(
            r#"
            SELECT image_media_id, processed_media_id, width, file_type
            FROM media_image_sizes
            WHERE image_media_id = $1
            ORDER BY width
            "#,
        )
        .bind(image_media_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn upsert_image_metadata(&self, metadata: &MediaImageMetadata) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO media_image_metadata (image_media_id, width, height)
            VALUES ($1, $2, $3)
            ON CONFLICT (image_media_id) DO UPDATE SET width = EXCLUDED.width, height = EXCLUDED.height
            "#,
        )
        .bind(metadata.image_media_id)
        .bind(metadata.width)
        .bind(metadata.height)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn image_metadata(&self, image_media_id: MediaId) -> Result<Option<MediaImageMetadata>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaImageMetadata>(
            "SELECT image_media_id, width, height FROM media_image_metadata WHERE image_media_id = $1",
        )
        .bind(image_media_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
