//! External encoder invocations.

use crate::ladder::Rung;
use crate::probe::{parse_probe_output, VideoProbe};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Probing, HLS encoding and frame capture. Swappable so the pipeline can be
/// driven without ffmpeg installed.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<VideoProbe>;

    /// Encode one rung into `output_dir` as `index.m3u8` plus numbered `.ts`
    /// segments.
    async fn encode_hls_rung(&self, input: &Path, output_dir: &Path, rung: &Rung) -> Result<()>;

    /// Write a single jpg frame taken at `at_seconds`, scaled to `width`.
    async fn screenshot(&self, input: &Path, output: &Path, at_seconds: f64, width: u32) -> Result<()>;
}

fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }
    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }
    Ok(())
}

/// Toolchain backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    ffmpeg_path: String,
    ffprobe_path: String,
    segment_duration: u64,
}

impl FfmpegToolchain {
    pub fn new(ffmpeg_path: String, ffprobe_path: String, segment_duration: u64) -> Result<Self> {
        validate_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        validate_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
            segment_duration,
        })
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("FFmpeg failed: {}", stderr));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    #[tracing::instrument(skip(self), fields(process.executable.name = "ffprobe"))]
    async fn probe(&self, input: &Path) -> Result<VideoProbe> {
        validate_path(&input.to_string_lossy()).context("Invalid video path")?;
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(input)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe = parse_probe_output(&output.stdout)?;
        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = probe.duration,
            width = probe.width,
            height = probe.height,
            "Video probe completed"
        );
        Ok(probe)
    }

    #[tracing::instrument(skip(self, input, output_dir), fields(process.executable.name = "ffmpeg", rung = rung.title))]
    async fn encode_hls_rung(&self, input: &Path, output_dir: &Path, rung: &Rung) -> Result<()> {
        let input = input.to_string_lossy().to_string();
        validate_path(&input).context("Invalid video path")?;
        let segment_pattern = output_dir.join("%d.ts");
        let manifest = output_dir.join("index.m3u8");

        let args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            input,
            "-c:v".into(),
            "h264".into(),
            "-b:v".into(),
            rung.video_bitrate.into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            rung.audio_bitrate.into(),
            "-vf".into(),
            format!("scale={}", rung.resolution.replace('x', ":")),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_duration.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            "24".into(),
            "-hls_segment_filename".into(),
            segment_pattern.to_string_lossy().to_string(),
            manifest.to_string_lossy().to_string(),
        ];

        let start = std::time::Instant::now();
        self.run_ffmpeg(&args).await?;
        tracing::info!(duration_ms = start.elapsed().as_millis() as u64, "HLS rung encoded");
        Ok(())
    }

    #[tracing::instrument(skip(self, input, output), fields(process.executable.name = "ffmpeg"))]
    async fn screenshot(&self, input: &Path, output: &Path, at_seconds: f64, width: u32) -> Result<()> {
        let input = input.to_string_lossy().to_string();
        validate_path(&input).context("Invalid video path")?;

        let args: Vec<String> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{:.3}", at_seconds.max(0.0)),
            "-i".into(),
            input,
            "-frames:v".into(),
            "1".into(),
            "-vf".into(),
            format!("scale={}:-1", width),
            "-q:v".into(),
            "2".into(),
            output.to_string_lossy().to_string(),
        ];
        self.run_ffmpeg(&args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_shell_metacharacters() {
        assert!(validate_path("/tmp/video.mp4").is_ok());
        assert!(validate_path("/tmp/$(rm).mp4").is_err());
        assert!(validate_path("/tmp/../etc/passwd").is_err());
        assert!(FfmpegToolchain::new("ffmpeg;ls".into(), "ffprobe".into(), 10).is_err());
    }
}
