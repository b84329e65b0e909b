pub mod cloud;
pub mod health;
pub mod media;
pub mod projects;
pub mod uploads;

use stagecast_core::models::Media;
use stagecast_core::{AppError, MediaId};

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::state::AppState;

/// Load a media by id or name, hiding media of other organizations.
pub(crate) async fn owned_media(
    state: &AppState,
    identity: &Identity,
    name: &str,
) -> Result<Media, HttpAppError> {
    let id = MediaId::resolve(name).map_err(AppError::from)?;
    match state.media.get(id).await? {
        Some(media) if media.organization_id == identity.organization_id => Ok(media),
        _ => Err(AppError::media_not_found(name).into()),
    }
}
