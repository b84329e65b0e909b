use anyhow::Result;
use async_trait::async_trait;
use stagecast_core::{MediaId, MediaName};
use std::path::Path;
use uuid::Uuid;

use crate::types::{RemoteMedia, RemoteMediaInfo, RemoteProject, RemoteProjectStamp};

/// Query surface of a remote instance, scoped to one connection credential.
#[async_trait]
pub trait RemoteInstance: Send + Sync {
    /// Every project of the organization with its `updatedAt`.
    async fn project_stamps(&self, organization_slug: &str) -> Result<Vec<RemoteProjectStamp>>;

    /// Full metadata for the given projects of the organization.
    async fn project_metadata(
        &self,
        organization_slug: &str,
        project_ids: &[Uuid],
    ) -> Result<Vec<RemoteProject>>;

    /// Media of the projects plus their remote derived closure.
    async fn media_of_projects(&self, project_ids: &[Uuid]) -> Result<Vec<RemoteMedia>>;

    async fn media_info(&self, project_ids: &[Uuid], media_ids: &[MediaId]) -> Result<RemoteMediaInfo>;

    /// Organization slugs of the user owning the credential.
    async fn organization_list(&self) -> Result<Vec<String>>;

    /// Write the media bytes to `dest`, returning the number of bytes written.
    async fn download_media(&self, media_name: &MediaName, dest: &Path) -> Result<u64>;
}
