use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use stagecast_core::{AppError, ErrorMetadata, LogLevel};
use stagecast_storage::StorageError;

/// Newtype so axum can turn domain errors into responses.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        // Repository errors travel through anyhow in the sync layer.
        match err.downcast::<AppError>() {
            Ok(app) => HttpAppError(app),
            Err(err) => HttpAppError(AppError::InternalWithSource {
                message: err.to_string(),
                source: err,
            }),
        }
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::BadRequest(rejection.body_text()))
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        HttpAppError(AppError::BadRequest(format!("Invalid multipart body: {}", err)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            error_type: None,
            code: code.into(),
            recoverable: false,
            suggested_action: None,
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error_code = app_error.error_code();
        let message = app_error.client_message();

        match app_error.log_level() {
            LogLevel::Error => tracing::error!(
                error = %app_error.detailed_message(),
                error_code,
                status = status.as_u16(),
                "Request failed"
            ),
            LogLevel::Warn => tracing::warn!(
                error = %app_error,
                error_code,
                status = status.as_u16(),
                "Request failed"
            ),
            LogLevel::Debug => tracing::debug!(
                error = %app_error,
                error_code,
                status = status.as_u16(),
                "Request rejected"
            ),
        }

        let hide_details = is_production_env() || app_error.is_sensitive();
        let body = ErrorResponse {
            error: message,
            details: (!hide_details).then(|| app_error.detailed_message()),
            error_type: (!hide_details).then(|| app_error.error_type().to_string()),
            code: error_code.to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        (status, Json(body)).into_response()
    }
}
