//! Stagecast HTTP API
//!
//! axum handlers for uploads, media serving and deletion, project links and
//! cloud sync, plus the task dispatch the worker calls into.

pub mod auth;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod task_dispatch;

pub use error::{ErrorResponse, HttpAppError};
pub use handlers::cloud::SyncEnqueuedResponse;
pub use handlers::uploads::{UploadSessionResponse, UPLOAD_OFFSET_HEADER};
pub use state::AppState;
