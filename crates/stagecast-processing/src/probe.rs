//! ffprobe output parsing.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use stagecast_core::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    /// Seconds.
    pub duration: f64,
    pub bitrate: Option<u64>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
/// Fails when the file carries no video stream.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe> {
    let probe: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe["streams"]
        .as_array()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s["codec_type"].as_str().map_or(true, |t| t == "video"))
        })
        .ok_or_else(|| AppError::Transcode("No video stream found".to_string()))?;
    let format = &probe["format"];

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse width"))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| anyhow!("Could not parse height"))? as u32;
    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| stream["duration"].as_str().and_then(|d| d.parse::<f64>().ok()))
        .ok_or_else(|| anyhow!("Could not parse duration"))?;
    let bitrate = format["bit_rate"].as_str().and_then(|b| b.parse::<u64>().ok());

    Ok(VideoProbe {
        width,
        height,
        duration,
        bitrate,
    })
}
