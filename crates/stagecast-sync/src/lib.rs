//! Cloud sync: reconcile an organization's projects, taxonomy and media
//! against a remote instance.
//!
//! [`ProjectReconciler`] runs first and enqueues the media follow-up that
//! [`MediaReconciler`] consumes. Both are safe to re-run after a failure.

mod context;
pub mod diff;
mod media;
mod organizations;
mod project;

pub use context::{HttpConnector, RemoteConnector, SyncRepositories};
pub use media::{MediaReconciler, MediaSyncReport};
pub use organizations::refresh_organization_list;
pub use project::{ProjectReconciler, ProjectSyncReport};
