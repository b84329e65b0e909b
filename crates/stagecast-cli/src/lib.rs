//! Helpers shared by the admin commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stagecast_core::models::Media;
use uuid::Uuid;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn parse_uuids(values: &[String]) -> Result<Vec<Uuid>> {
    values
        .iter()
        .map(|v| Uuid::parse_str(v.trim()).with_context(|| format!("Invalid id: {}", v)))
        .collect()
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// One line of `closure` output.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRow {
    pub media_name: String,
    pub original_name: Option<String>,
    pub size: Option<i64>,
    pub derived: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Media> for MediaRow {
    fn from(media: &Media) -> Self {
        Self {
            media_name: media.media_name().to_string(),
            original_name: media.original_name.as_deref().map(|n| truncate_string(n, 40)),
            size: media.file_size,
            derived: !media.is_user_uploaded,
            created_at: media.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecast_core::MediaId;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_counts_characters() {
        assert_eq!(truncate_string("ééééé", 5), "ééééé");
        assert_eq!(truncate_string("éééééé", 5), "éé...");
    }

    #[test]
    fn parse_uuids_reports_bad_value() {
        let good = Uuid::new_v4();
        assert_eq!(parse_uuids(&[good.to_string()]).unwrap(), vec![good]);

        let err = parse_uuids(&[good.to_string(), "launch".to_string()]).unwrap_err();
        assert!(err.to_string().contains("launch"));
    }

    #[test]
    fn media_row_marks_derived_media() {
        let now = Utc::now();
        let media = Media {
            id: MediaId::new(),
            extension: "ts".into(),
            file_size: Some(188),
            file_offset: 188,
            original_name: None,
            organization_id: Uuid::new_v4(),
            creator_user_id: None,
            is_complete: true,
            is_user_uploaded: false,
            created_at: now,
            updated_at: now,
        };
        let row = MediaRow::from(&media);
        assert!(row.derived);
        assert!(row.media_name.ends_with(".ts"));
    }
}
