//! Stagecast video processing: ffprobe/ffmpeg toolchain and the resumable
//! HLS transcoding pipeline.

pub mod checkpoint;
pub mod ladder;
pub mod pipeline;
pub mod playlist;
pub mod probe;
pub mod store;
pub mod toolchain;

pub use checkpoint::ScratchDir;
pub use ladder::{select_ladder, Rung, LADDER};
pub use pipeline::{TranscodeOutcome, TranscodePipeline, TranscodeSettings};
pub use probe::VideoProbe;
pub use store::{RepositoryTranscodeStore, TranscodeStore};
pub use toolchain::{FfmpegToolchain, MediaToolchain};
