//! GraphQL documents sent to a remote instance and their response envelopes.

use serde::Deserialize;
use stagecast_core::models::{MediaDependency, MediaImageSize, MediaVideoMetadata};

use crate::types::{
    RemoteCategory, RemoteMedia, RemoteProject, RemoteProjectMedia, RemoteProjectStamp, RemoteTag,
};

pub const ALL_PROJECT_UPDATED_AT: &str = r#"
query AllProjectUpdatedAt($slug: String!) {
  organizationBySlug(slug: $slug) {
    projects {
      nodes { id updatedAt }
    }
  }
}
"#;

pub const ALL_PROJECT_METADATA: &str = r#"
query AllProjectMetadata($slug: String!, $projectIds: [UUID!]) {
  organizationBySlug(slug: $slug) {
    projects(filter: { id: { in: $projectIds } }) {
      nodes {
        id
        slug
        name
        targetDate
        createdAt
        updatedAt
        category { name }
        projectTags { nodes { tag { name color } } }
      }
    }
  }
}
"#;

pub const PROJECT_MEDIAS: &str = r#"
query ProjectMedias($projectIds: [UUID!]) {
  allMediaOfProjects(input: { projectIds: $projectIds }) {
    id
    mediaName
    fileExtension
    fileSize
    originalName
    isUserUploaded
    createdAt
  }
}
"#;

pub const PROJECT_MEDIA_INFO: &str = r#"
query ProjectMediaInfo($mediaIds: [UUID!], $projectIds: [UUID!]) {
  mediaDependencies(filter: { childMediaId: { in: $mediaIds } }) {
    nodes { parentMediaId childMediaId }
  }
  mediaImageSizes(filter: { imageMediaId: { in: $mediaIds } }) {
    nodes { imageMediaId processedMediaId width fileType }
  }
  mediaVideoMetadata(filter: { videoMediaId: { in: $mediaIds } }) {
    nodes { videoMediaId hlsMediaId thumbnailMediaId duration }
  }
  projectMedias(filter: { projectId: { in: $projectIds } }) {
    nodes { projectId mediaId pluginId }
  }
}
"#;

pub const ORGANIZATION_LIST: &str = r#"
query OrganizationList {
  currentUser {
    organizationMemberships {
      nodes { organization { slug } }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> Vec<T> {
        self.nodes
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationProjects<T> {
    pub organization_by_slug: Option<ProjectsOf<T>>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectsOf<T> {
    pub projects: Connection<T>,
}

impl<T> OrganizationProjects<T> {
    /// An unknown slug yields no projects.
    pub fn into_projects(self) -> Vec<T> {
        self.organization_by_slug
            .map(|org| org.projects.into_nodes())
            .unwrap_or_default()
    }
}

pub type AllProjectUpdatedAt = OrganizationProjects<RemoteProjectStamp>;
pub type AllProjectMetadata = OrganizationProjects<ProjectNode>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub id: uuid::Uuid,
    pub slug: String,
    pub name: String,
    pub target_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub category: Option<RemoteCategory>,
    pub project_tags: Option<Connection<ProjectTagNode>>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectTagNode {
    pub tag: Option<RemoteTag>,
}

impl From<ProjectNode> for RemoteProject {
    fn from(node: ProjectNode) -> Self {
        let tags = node
            .project_tags
            .map(|c| c.into_nodes().into_iter().filter_map(|n| n.tag).collect())
            .unwrap_or_default();
        RemoteProject {
            id: node.id,
            slug: node.slug,
            name: node.name,
            target_date: node.target_date,
            created_at: node.created_at,
            updated_at: node.updated_at,
            category: node.category,
            tags,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMedias {
    /// The remote resolver returns a nullable list of nullable rows.
    pub all_media_of_projects: Option<Vec<Option<RemoteMedia>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMediaInfo {
    pub media_dependencies: Option<Connection<MediaDependency>>,
    pub media_image_sizes: Option<Connection<MediaImageSize>>,
    pub media_video_metadata: Option<Connection<MediaVideoMetadata>>,
    pub project_medias: Option<Connection<RemoteProjectMedia>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationList {
    pub current_user: Option<CurrentUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub organization_memberships: Connection<Membership>,
}

#[derive(Debug, Deserialize)]
pub struct Membership {
    pub organization: Option<OrganizationSlug>,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationSlug {
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_node_flattens_tags() {
        let raw = serde_json::json!({
            "organizationBySlug": {
                "projects": {
                    "nodes": [{
                        "id": "0190f0a0-0000-7000-8000-000000000001",
                        "slug": "launch",
                        "name": "Launch",
                        "targetDate": null,
                        "createdAt": "2024-01-01T00:00:00Z",
                        "updatedAt": "2024-02-01T00:00:00Z",
                        "category": { "name": "Events" },
                        "projectTags": { "nodes": [
                            { "tag": { "name": "urgent", "color": "#f00" } },
                            { "tag": null }
                        ] }
                    }]
                }
            }
        });
        let parsed: AllProjectMetadata = serde_json::from_value(raw).unwrap();
        let projects: Vec<RemoteProject> =
            parsed.into_projects().into_iter().map(RemoteProject::from).collect();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].category.as_ref().unwrap().name, "Events");
        assert_eq!(
            projects[0].tags,
            vec![RemoteTag {
                name: "urgent".into(),
                color: Some("#f00".into())
            }]
        );
    }

    #[test]
    fn test_unknown_organization_has_no_projects() {
        let parsed: AllProjectUpdatedAt =
            serde_json::from_value(serde_json::json!({ "organizationBySlug": null })).unwrap();
        assert!(parsed.into_projects().is_empty());
    }
}
