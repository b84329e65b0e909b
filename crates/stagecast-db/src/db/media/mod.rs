pub mod dependency;
#[allow(clippy::module_inception)]
pub mod media;
pub mod metadata;
pub mod project_media;

pub use dependency::{breadth_first, DependencyRepository};
pub use media::{MediaRepository, MediaSource};
pub use metadata::MediaMetadataRepository;
pub use project_media::ProjectMediaRepository;
