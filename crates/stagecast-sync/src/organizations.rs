use anyhow::{Context, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{RemoteConnector, SyncRepositories};

/// Fetch the organizations the connection's credential can see and cache
/// them on the connection row.
#[tracing::instrument(skip(repos, connector), fields(cloud_connection_id = %connection_id))]
pub async fn refresh_organization_list(
    repos: &SyncRepositories,
    connector: &Arc<dyn RemoteConnector>,
    connection_id: Uuid,
) -> Result<Vec<String>> {
    let connection = repos.connections.get(connection_id).await?;
    let remote = connector.connect(&connection)?;
    let slugs = remote
        .organization_list()
        .await
        .context("Failed to fetch organization list")?;

    repos.connections.set_organization_list(connection_id, &slugs).await?;
    tracing::info!(organizations = slugs.len(), "Organization list refreshed");
    Ok(slugs)
}
