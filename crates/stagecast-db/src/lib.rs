//! Stagecast Database Layer
//!
//! Postgres repositories for media, the derived-artifact graph, mirrored
//! projects and the task queue.

pub mod db;

pub use db::cloud::{CloudConnectionRepository, ProjectRepository, TaxonomyRepository};
pub use db::media::{
    breadth_first, DependencyRepository, MediaMetadataRepository, MediaRepository, MediaSource,
    ProjectMediaRepository,
};
pub use db::task::{TaskRepository, TASK_NOTIFY_CHANNEL};

/// Migrations embedded from the workspace `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
