//! Route table

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{cloud, health, media, projects, uploads};
use crate::state::AppState;

/// Largest request body accepted, chunk or multipart.
pub const MAX_REQUEST_BODY_BYTES: usize = 512 * 1024 * 1024;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/media", post(media::upload_media))
        .route("/media/{media_name}", axum::routing::delete(media::delete_media))
        .route("/media/data/{media_name}", get(media::serve_media))
        .route("/media/uploads", post(uploads::begin_upload))
        .route(
            "/media/uploads/{upload_id}",
            patch(uploads::write_chunk).head(uploads::upload_status),
        )
        .route(
            "/media/uploads/{upload_id}/complete",
            post(uploads::complete_upload),
        )
        .route("/projects/media", post(projects::all_media_of_projects))
        .route("/projects/{project_id}/media", post(projects::attach_media))
        .route(
            "/plugins/{plugin_id}/media",
            axum::routing::delete(projects::unlink_plugin),
        )
        .route(
            "/cloud-connections/{connection_id}/organizations",
            get(cloud::organization_list),
        )
        .route(
            "/cloud-connections/{connection_id}/sync",
            post(cloud::start_sync),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
