pub mod cloud;
pub mod media;
pub mod project;
pub mod task;

pub use cloud::CloudConnection;
pub use media::{
    Media, MediaDependency, MediaImageMetadata, MediaImageSize, MediaVideoMetadata, NewMedia,
    UploadMediaResponse,
};
pub use project::{Category, CloudProjectMedia, Project, ProjectMedia, ProjectUpsert, Tag};
pub use task::{
    CloudSyncMediaPayload, CloudSyncPayload, Priority, ProjectSyncDocumentPayload, Task,
    TaskPayload, TaskStatus, TaskType, VideoTranscodePayload,
};
