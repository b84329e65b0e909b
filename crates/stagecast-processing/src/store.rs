//! Persistence seam of the transcoding pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use stagecast_core::models::{Media, MediaVideoMetadata, NewMedia};
use stagecast_core::MediaId;
use stagecast_db::{DependencyRepository, MediaMetadataRepository, MediaRepository, MediaSource};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait TranscodeStore: Send + Sync {
    async fn get_media(&self, id: MediaId) -> Result<Option<Media>>;

    /// Whether the video already carries its derived metadata row.
    async fn video_metadata_exists(&self, id: MediaId) -> Result<bool>;

    /// Copy the media's bytes to `dest`.
    async fn download_to(&self, media: &Media, dest: &Path) -> Result<()>;

    async fn upload_file(&self, new: NewMedia, path: &Path) -> Result<Media>;

    async fn create_dependency(&self, parent: MediaId, child: MediaId) -> Result<()>;

    async fn insert_video_metadata(&self, metadata: &MediaVideoMetadata) -> Result<()>;
}

/// [`TranscodeStore`] over the Postgres repositories and the blob backend.
#[derive(Clone)]
pub struct RepositoryTranscodeStore {
    media: MediaRepository,
    dependencies: DependencyRepository,
    metadata: MediaMetadataRepository,
}

impl RepositoryTranscodeStore {
    pub fn new(
        media: MediaRepository,
        dependencies: DependencyRepository,
        metadata: MediaMetadataRepository,
    ) -> Self {
        Self {
            media,
            dependencies,
            metadata,
        }
    }
}

#[async_trait]
impl TranscodeStore for RepositoryTranscodeStore {
    async fn get_media(&self, id: MediaId) -> Result<Option<Media>> {
        Ok(self.media.get(id).await?)
    }

    async fn video_metadata_exists(&self, id: MediaId) -> Result<bool> {
        Ok(self.metadata.video_metadata(id).await?.is_some())
    }

    async fn download_to(&self, media: &Media, dest: &Path) -> Result<()> {
        let name = media.media_name().to_string();
        let mut stream = self
            .media
            .storage()
            .download_stream(&name)
            .await
            .with_context(|| format!("Failed to open {} for download", name))?;

        // Written under a temporary name so an interrupted download is not
        // mistaken for a materialized source.
        let partial: PathBuf = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed to download {}", name))?;
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;
        tokio::fs::rename(&partial, dest).await?;
        Ok(())
    }

    async fn upload_file(&self, new: NewMedia, path: &Path) -> Result<Media> {
        Ok(self
            .media
            .upload_media(MediaSource::File(path.to_path_buf()), new)
            .await?)
    }

    async fn create_dependency(&self, parent: MediaId, child: MediaId) -> Result<()> {
        self.dependencies.create_dependency(parent, child).await?;
        Ok(())
    }

    async fn insert_video_metadata(&self, metadata: &MediaVideoMetadata) -> Result<()> {
        self.metadata.insert_video_metadata(metadata).await?;
        Ok(())
    }
}
