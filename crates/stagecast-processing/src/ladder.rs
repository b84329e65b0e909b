//! HLS rendition ladder.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    pub title: &'static str,
    /// Kept when the source's smaller dimension is at least this.
    pub threshold: u32,
    pub resolution: &'static str,
    pub video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
    /// Advertised in the master manifest.
    pub bandwidth: u64,
}

pub const LADDER: [Rung; 4] = [
    Rung {
        title: "1080p",
        threshold: 1080,
        resolution: "1920x1080",
        video_bitrate: "5000k",
        audio_bitrate: "192k",
        bandwidth: 5_565_000,
    },
    Rung {
        title: "720p",
        threshold: 720,
        resolution: "1280x720",
        video_bitrate: "2800k",
        audio_bitrate: "128k",
        bandwidth: 3_134_000,
    },
    Rung {
        title: "480p",
        threshold: 480,
        resolution: "842x480",
        video_bitrate: "1400k",
        audio_bitrate: "128k",
        bandwidth: 1_635_000,
    },
    Rung {
        title: "360p",
        threshold: 360,
        resolution: "640x360",
        video_bitrate: "800k",
        audio_bitrate: "96k",
        bandwidth: 958_000,
    },
];

/// Rungs whose threshold fits within `min(width, height)`, highest first.
pub fn select_ladder(width: u32, height: u32) -> Vec<Rung> {
    let smallest = width.min(height);
    LADDER
        .iter()
        .filter(|rung| rung.threshold <= smallest)
        .copied()
        .collect()
}
