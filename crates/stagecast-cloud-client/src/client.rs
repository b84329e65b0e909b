use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use stagecast_core::constants::media_data_url;
use stagecast_core::models::CloudConnection;
use stagecast_core::{MediaId, MediaName};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::queries::{
    AllProjectMetadata, AllProjectUpdatedAt, GraphQlResponse, OrganizationList, ProjectMediaInfo,
    ProjectMedias, ALL_PROJECT_METADATA, ALL_PROJECT_UPDATED_AT, ORGANIZATION_LIST,
    PROJECT_MEDIAS, PROJECT_MEDIA_INFO,
};
use crate::remote::RemoteInstance;
use crate::types::{RemoteMedia, RemoteMediaInfo, RemoteProject, RemoteProjectStamp};

/// HTTP client for a remote instance: GraphQL at `{host}/graphql`, bytes at
/// `{host}/media/data/{name}`.
#[derive(Clone, Debug)]
pub struct CloudClient {
    client: Client,
    base_url: String,
    token: String,
}

impl CloudClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_connection(connection: &CloudConnection, timeout: Duration) -> Result<Self> {
        Self::new(connection.base_url(), connection.api_token.clone(), timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.token))
    }

    /// Run one GraphQL document. Transport failures, non-2xx statuses and
    /// GraphQL `errors` all fail the call.
    pub async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
    ) -> Result<T> {
        let start = Instant::now();
        let request = self
            .client
            .post(self.build_url("/graphql"))
            .json(&json!({ "query": document, "variables": variables }));
        let response = self
            .apply_auth(request)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Remote query {} failed with status {}: {}",
                operation,
                status,
                error_text
            ));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        tracing::debug!(
            operation = operation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote query completed"
        );

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow::anyhow!(
                "Remote query {} returned errors: {}",
                operation,
                messages.join("; ")
            ));
        }

        body.data
            .ok_or_else(|| anyhow::anyhow!("Remote query {} returned no data", operation))
    }
}

#[async_trait]
impl RemoteInstance for CloudClient {
    #[tracing::instrument(skip(self), fields(remote.operation = "AllProjectUpdatedAt"))]
    async fn project_stamps(&self, organization_slug: &str) -> Result<Vec<RemoteProjectStamp>> {
        let data: AllProjectUpdatedAt = self
            .query(
                "AllProjectUpdatedAt",
                ALL_PROJECT_UPDATED_AT,
                json!({ "slug": organization_slug }),
            )
            .await?;
        Ok(data.into_projects())
    }

    #[tracing::instrument(skip(self, project_ids), fields(remote.operation = "AllProjectMetadata", count = project_ids.len()))]
    async fn project_metadata(
        &self,
        organization_slug: &str,
        project_ids: &[Uuid],
    ) -> Result<Vec<RemoteProject>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let data: AllProjectMetadata = self
            .query(
                "AllProjectMetadata",
                ALL_PROJECT_METADATA,
                json!({ "slug": organization_slug, "projectIds": project_ids }),
            )
            .await?;
        Ok(data.into_projects().into_iter().map(RemoteProject::from).collect())
    }

    #[tracing::instrument(skip(self, project_ids), fields(remote.operation = "ProjectMedias", count = project_ids.len()))]
    async fn media_of_projects(&self, project_ids: &[Uuid]) -> Result<Vec<RemoteMedia>> {
        let data: ProjectMedias = self
            .query(
                "ProjectMedias",
                PROJECT_MEDIAS,
                json!({ "projectIds": project_ids }),
            )
            .await?;
        Ok(data
            .all_media_of_projects
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect())
    }

    #[tracing::instrument(skip(self, project_ids, media_ids), fields(remote.operation = "ProjectMediaInfo", count = media_ids.len()))]
    async fn media_info(&self, project_ids: &[Uuid], media_ids: &[MediaId]) -> Result<RemoteMediaInfo> {
        let media_ids: Vec<Uuid> = media_ids.iter().map(MediaId::as_uuid).collect();
        let data: ProjectMediaInfo = self
            .query(
                "ProjectMediaInfo",
                PROJECT_MEDIA_INFO,
                json!({ "mediaIds": media_ids, "projectIds": project_ids }),
            )
            .await?;

        Ok(RemoteMediaInfo {
            dependencies: data.media_dependencies.map(|c| c.into_nodes()).unwrap_or_default(),
            image_sizes: data.media_image_sizes.map(|c| c.into_nodes()).unwrap_or_default(),
            video_metadata: data.media_video_metadata.map(|c| c.into_nodes()).unwrap_or_default(),
            project_medias: data
                .project_medias
                .map(|c| c.into_nodes().into_iter().map(Into::into).collect())
                .unwrap_or_default(),
        })
    }

    #[tracing::instrument(skip(self), fields(remote.operation = "OrganizationList"))]
    async fn organization_list(&self) -> Result<Vec<String>> {
        let data: OrganizationList = self
            .query("OrganizationList", ORGANIZATION_LIST, json!({}))
            .await?;
        Ok(data
            .current_user
            .map(|user| {
                user.organization_memberships
                    .into_nodes()
                    .into_iter()
                    .filter_map(|m| m.organization.map(|o| o.slug))
                    .collect()
            })
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self, dest), fields(media_name = %media_name))]
    async fn download_media(&self, media_name: &MediaName, dest: &Path) -> Result<u64> {
        let url = self.build_url(&media_data_url(&media_name.to_string()));
        let mut response = self
            .apply_auth(self.client.get(&url))
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Download of {} failed with status {}",
                media_name,
                status
            ));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body of {}", media_name))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> CloudClient {
        CloudClient::new(&format!("{}/", server.url()), "token-1", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_project_stamps_sends_bearer_and_slug() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer token-1")
            .match_body(Matcher::PartialJson(json!({ "variables": { "slug": "acme" } })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": { "organizationBySlug": { "projects": { "nodes": [
                        { "id": "0190f0a0-0000-7000-8000-000000000001", "updatedAt": "2024-02-01T00:00:00Z" }
                    ] } } }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let stamps = client(&server).project_stamps("acme").await.unwrap();
        mock.assert_async().await;
        assert_eq!(stamps.len(), 1);
        assert_eq!(stamps[0].id.to_string(), "0190f0a0-0000-7000-8000-000000000001");
    }

    #[tokio::test]
    async fn test_graphql_errors_fail_the_call() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({ "data": null, "errors": [{ "message": "permission denied" }] }).to_string())
            .create_async()
            .await;

        let err = client(&server).organization_list().await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_http_status_fails_the_call() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client(&server).project_stamps("acme").await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_media_of_projects_skips_null_rows() {
        let mut server = mockito::Server::new_async().await;
        let id = MediaId::new();
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({ "data": { "allMediaOfProjects": [
                    null,
                    {
                        "id": id.as_uuid(),
                        "mediaName": format!("{}.png", id),
                        "fileExtension": "png",
                        "fileSize": 4,
                        "originalName": "a.png",
                        "isUserUploaded": true,
                        "createdAt": "2024-01-01T00:00:00Z"
                    }
                ] } })
                .to_string(),
            )
            .create_async()
            .await;

        let media = client(&server)
            .media_of_projects(&[Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].id, id);
        assert_eq!(media[0].media_name.extension, "png");
    }

    #[tokio::test]
    async fn test_organization_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({ "data": { "currentUser": { "organizationMemberships": { "nodes": [
                    { "organization": { "slug": "acme" } },
                    { "organization": null },
                    { "organization": { "slug": "globex" } }
                ] } } } })
                .to_string(),
            )
            .create_async()
            .await;

        let slugs = client(&server).organization_list().await.unwrap();
        assert_eq!(slugs, vec!["acme".to_string(), "globex".to_string()]);
    }

    #[tokio::test]
    async fn test_download_media_writes_file() {
        let mut server = mockito::Server::new_async().await;
        let name = MediaId::new().with_extension("ts");
        let path = format!("/media/data/{}", name);
        server
            .mock("GET", path.as_str())
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(b"segment-bytes".to_vec())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.ts");
        let written = client(&server).download_media(&name, &dest).await.unwrap();
        assert_eq!(written, 13);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"segment-bytes");
    }

    #[tokio::test]
    async fn test_download_missing_media_fails() {
        let mut server = mockito::Server::new_async().await;
        let name = MediaId::new().with_extension("ts");
        server
            .mock("GET", format!("/media/data/{}", name).as_str())
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(&server)
            .download_media(&name, &dir.path().join("out.ts"))
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("out.ts").exists());
    }

    #[tokio::test]
    async fn test_metadata_skips_request_for_no_projects() {
        let server = mockito::Server::new_async().await;
        let projects = client(&server).project_metadata("acme", &[]).await.unwrap();
        assert!(projects.is_empty());
    }
}
