//! Configuration module
//!
//! Every binary builds one [`Config`] at startup from the process environment
//! (after loading `.env` through dotenvy) and passes it down explicitly.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub log_format: String,

    // Blob backend
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: PathBuf,
    pub media_public_base_url: String,
    pub upload_staging_path: PathBuf,
    pub upload_max_attempts: u32,

    // Transcoding
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub transcode_scratch_dir: PathBuf,
    pub hls_segment_duration: u64,
    pub thumbnail_width: u32,

    // Task queue
    pub task_queue_max_workers: usize,
    pub task_queue_poll_interval_ms: u64,
    pub task_queue_default_timeout_seconds: i32,
    pub task_queue_max_retries: i32,

    pub cloud_request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        const HLS_SEGMENT_DURATION: u64 = 10;
        const THUMBNAIL_WIDTH: u32 = 360;
        const UPLOAD_MAX_ATTEMPTS: u32 = 5;
        const TASK_QUEUE_MAX_WORKERS: usize = 4;
        const TASK_QUEUE_POLL_INTERVAL_MS: u64 = 1000;
        const TASK_QUEUE_DEFAULT_TIMEOUT_SECS: i32 = 3600;
        const TASK_QUEUE_MAX_RETRIES: i32 = 3;
        const CLOUD_REQUEST_TIMEOUT_SECS: u64 = 60;

        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            parsed("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = match parsed("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let local_storage_path: PathBuf = parsed("LOCAL_STORAGE_PATH")
            .unwrap_or_else(|| "./data/media".to_string())
            .into();

        Ok(Self {
            server_port: parsed("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(SERVER_PORT),
            environment: parsed("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            database_url,
            db_max_connections: parsed("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: parsed("DB_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            log_format: parsed("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            storage_backend,
            s3_bucket: parsed("S3_BUCKET"),
            s3_region: parsed("S3_REGION").or_else(|| parsed("AWS_REGION")),
            s3_endpoint: parsed("S3_ENDPOINT"),
            upload_staging_path: parsed("UPLOAD_STAGING_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| local_storage_path.join(".uploads")),
            local_storage_path,
            media_public_base_url: parsed("MEDIA_PUBLIC_BASE_URL")
                .unwrap_or_else(|| crate::constants::MEDIA_DATA_PATH.to_string()),
            upload_max_attempts: parsed("UPLOAD_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(UPLOAD_MAX_ATTEMPTS),
            ffmpeg_path: parsed("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: parsed("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            transcode_scratch_dir: parsed("TRANSCODE_SCRATCH_DIR")
                .unwrap_or_else(|| "tmp/videoTranscode".to_string())
                .into(),
            hls_segment_duration: parsed("HLS_SEGMENT_DURATION")
                .and_then(|v| v.parse().ok())
                .unwrap_or(HLS_SEGMENT_DURATION),
            thumbnail_width: parsed("THUMBNAIL_WIDTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(THUMBNAIL_WIDTH),
            task_queue_max_workers: parsed("TASK_QUEUE_MAX_WORKERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_poll_interval_ms: parsed("TASK_QUEUE_POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(TASK_QUEUE_POLL_INTERVAL_MS),
            task_queue_default_timeout_seconds: parsed("TASK_QUEUE_DEFAULT_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(TASK_QUEUE_DEFAULT_TIMEOUT_SECS),
            task_queue_max_retries: parsed("TASK_QUEUE_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(TASK_QUEUE_MAX_RETRIES),
            cloud_request_timeout_secs: parsed("CLOUD_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(CLOUD_REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.is_none() {
                return Err(anyhow::anyhow!("STORAGE_BACKEND=s3 requires S3_BUCKET"));
            }
            if self.s3_region.is_none() {
                return Err(anyhow::anyhow!(
                    "STORAGE_BACKEND=s3 requires S3_REGION or AWS_REGION"
                ));
            }
        }

        if self.upload_max_attempts == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_ATTEMPTS must be at least 1"));
        }

        if self.hls_segment_duration == 0 {
            return Err(anyhow::anyhow!("HLS_SEGMENT_DURATION must be positive"));
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    fn inner(&self) -> &AppConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config(Box::new(AppConfig::from_env()?)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.inner().environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn log_json(&self) -> bool {
        self.inner().log_format.eq_ignore_ascii_case("json")
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> &std::path::Path {
        &self.inner().local_storage_path
    }

    pub fn media_public_base_url(&self) -> &str {
        &self.inner().media_public_base_url
    }

    pub fn upload_staging_path(&self) -> &std::path::Path {
        &self.inner().upload_staging_path
    }

    pub fn upload_max_attempts(&self) -> u32 {
        self.inner().upload_max_attempts
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.inner().ffprobe_path
    }

    pub fn transcode_scratch_dir(&self) -> &std::path::Path {
        &self.inner().transcode_scratch_dir
    }

    pub fn hls_segment_duration(&self) -> u64 {
        self.inner().hls_segment_duration
    }

    pub fn thumbnail_width(&self) -> u32 {
        self.inner().thumbnail_width
    }

    pub fn task_queue_max_workers(&self) -> usize {
        self.inner().task_queue_max_workers
    }

    pub fn task_queue_poll_interval_ms(&self) -> u64 {
        self.inner().task_queue_poll_interval_ms
    }

    pub fn task_queue_default_timeout_seconds(&self) -> i32 {
        self.inner().task_queue_default_timeout_seconds
    }

    pub fn task_queue_max_retries(&self) -> i32 {
        self.inner().task_queue_max_retries
    }

    pub fn cloud_request_timeout_secs(&self) -> u64 {
        self.inner().cloud_request_timeout_secs
    }
}
