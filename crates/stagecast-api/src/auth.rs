//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the caller's
//! organization and user as headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stagecast_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{} is not valid UTF-8", name)))?;
    Uuid::parse_str(value.trim())
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("{} must be a UUID", name)))
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let organization_id = header_uuid(parts, ORGANIZATION_HEADER)?.ok_or_else(|| {
            AppError::BadRequest(format!("Missing {} header", ORGANIZATION_HEADER))
        })?;
        let user_id = header_uuid(parts, USER_HEADER)?;
        Ok(Identity {
            organization_id,
            user_id,
        })
    }
}
