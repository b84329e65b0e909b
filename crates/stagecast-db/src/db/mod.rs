//! Repositories grouped by domain: media/ (blobs, graph, derived metadata,
//! project links), cloud/ (connections and the mirrored project model) and
//! the task queue.

pub mod cloud;
pub mod media;
pub mod task;
