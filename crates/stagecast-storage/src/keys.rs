//! Shared key generation for storage backends.

use crate::traits::{StorageError, StorageResult};

const MEDIA_PREFIX: &str = "media";

/// Storage key for a media name: `media/{media_name}`.
///
/// Names must be a single path segment; anything that could walk out of the
/// media prefix is rejected.
pub fn media_key(media_name: &str) -> StorageResult<String> {
    validate_name(media_name)?;
    Ok(format!("{}/{}", MEDIA_PREFIX, media_name))
}

pub fn validate_name(media_name: &str) -> StorageResult<()> {
    if media_name.is_empty()
        || media_name.contains("..")
        || media_name.contains('/')
        || media_name.contains('\\')
        || media_name.starts_with('.')
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid media name: {}",
            media_name
        )));
    }
    Ok(())
}

/// Join a public base (e.g. `/media/data` or a CDN origin) with a media name.
pub fn public_url(base_url: &str, media_name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), media_name)
}
