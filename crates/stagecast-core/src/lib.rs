//! Stagecast Core Library
//!
//! Domain models, identifiers, error types and configuration shared by every
//! Stagecast crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod models;
pub mod storage_types;
pub mod task_error;

pub use config::{AppConfig, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use ids::{MediaId, MediaName};
pub use storage_types::StorageBackend;
pub use task_error::{TaskError, TaskResultExt};
