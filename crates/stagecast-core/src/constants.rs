//! Application-wide constants.

/// Public path prefix under which media bytes are served.
pub const MEDIA_DATA_PATH: &str = "/media/data";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "mkv", "avi"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

pub fn is_video_extension(extension: &str) -> bool {
    let lower = extension.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&lower.as_str())
}

pub fn is_image_extension(extension: &str) -> bool {
    let lower = extension.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&lower.as_str())
}

/// Relative URL of a media object, e.g. `/media/data/media_xxx.m3u8`.
pub fn media_data_url(media_name: &str) -> String {
    format!("{}/{}", MEDIA_DATA_PATH, media_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_classification() {
        assert!(is_video_extension("MP4"));
        assert!(is_video_extension("webm"));
        assert!(!is_video_extension("png"));
        assert!(is_image_extension("JPEG"));
        assert!(!is_image_extension("m3u8"));
    }

    #[test]
    fn test_media_data_url() {
        assert_eq!(media_data_url("a.ts"), "/media/data/a.ts");
    }
}
