//! Resumable source video → HLS transcoding.
//!
//! A run walks a fixed sequence of stages. Every stage either finds its
//! output already present in the scratch directory (left by an earlier,
//! interrupted run) or produces it. Uploads are upserts and dependency edges
//! are insert-or-ignore, so repeating a stage after a crash converges. The
//! video metadata row is written last and gates every later run.

use crate::checkpoint::ScratchDir;
use crate::ladder::{select_ladder, Rung};
use crate::playlist::{master_manifest, rewrite_segments};
use crate::probe::VideoProbe;
use crate::store::TranscodeStore;
use crate::toolchain::MediaToolchain;
use anyhow::{anyhow, Context, Result};
use stagecast_core::models::{Media, MediaVideoMetadata, NewMedia};
use stagecast_core::{AppError, MediaId, MediaName, TaskError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStage {
    CheckDone,
    Materialize,
    Probe,
    SelectLadder,
    PerResolutionTranscode,
    MasterManifest,
    Upload,
    LinkGraph,
    Thumbnail,
    Finalize,
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranscodeStage::CheckDone => "check_done",
            TranscodeStage::Materialize => "materialize",
            TranscodeStage::Probe => "probe",
            TranscodeStage::SelectLadder => "select_ladder",
            TranscodeStage::PerResolutionTranscode => "per_resolution_transcode",
            TranscodeStage::MasterManifest => "master_manifest",
            TranscodeStage::Upload => "upload",
            TranscodeStage::LinkGraph => "link_graph",
            TranscodeStage::Thumbnail => "thumbnail",
            TranscodeStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeOutcome {
    Completed(MediaVideoMetadata),
    /// The video already had its metadata row; nothing was done.
    AlreadyTranscoded,
}

#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub scratch_base: PathBuf,
    pub thumbnail_width: u32,
}

/// One rung after encoding: its manifest and the directory holding it.
#[derive(Debug, Clone)]
struct EncodedRung {
    rung: Rung,
    dir: PathBuf,
    manifest: String,
}

#[derive(Clone)]
pub struct TranscodePipeline {
    toolchain: Arc<dyn MediaToolchain>,
    store: Arc<dyn TranscodeStore>,
    settings: TranscodeSettings,
}

impl TranscodePipeline {
    pub fn new(
        toolchain: Arc<dyn MediaToolchain>,
        store: Arc<dyn TranscodeStore>,
        settings: TranscodeSettings,
    ) -> Self {
        Self {
            toolchain,
            store,
            settings,
        }
    }

    #[tracing::instrument(skip(self), fields(media_id = %media_id))]
    pub async fn run(&self, media_id: MediaId) -> Result<TranscodeOutcome> {
        let start = std::time::Instant::now();

        if self.check_done(media_id).await.context(TranscodeStage::CheckDone)? {
            tracing::info!("Video already transcoded, skipping");
            return Ok(TranscodeOutcome::AlreadyTranscoded);
        }

        let media = self
            .store
            .get_media(media_id)
            .await?
            .ok_or_else(|| TaskError::unrecoverable(anyhow!("Media not found: {}", media_id)))?;
        let scratch = ScratchDir::new(&self.settings.scratch_base, &media.media_name().to_string())?;

        let source = self
            .materialize(&media, &scratch)
            .await
            .context(TranscodeStage::Materialize)?;
        let probe = self.toolchain.probe(&source).await.map_err(|e| {
            // A file without a video stream will not grow one on retry.
            if matches!(e.downcast_ref::<AppError>(), Some(AppError::Transcode(_))) {
                TaskError::unrecoverable(e.context(TranscodeStage::Probe)).into()
            } else {
                e.context(TranscodeStage::Probe)
            }
        })?;
        let ladder = self.select(&probe);

        let mut encoded = Vec::with_capacity(ladder.len());
        for rung in ladder {
            let rung_output = self
                .transcode_rung(&scratch, &source, rung)
                .await
                .with_context(|| format!("{} ({})", TranscodeStage::PerResolutionTranscode, rung.title))?;
            encoded.push(rung_output);
        }

        let master = self
            .master(&scratch, &encoded)
            .await
            .context(TranscodeStage::MasterManifest)?;
        self.upload(&media, &scratch, &master, &encoded)
            .await
            .context(TranscodeStage::Upload)?;
        let master_id = self
            .link_graph(&media, &master, &encoded)
            .await
            .context(TranscodeStage::LinkGraph)?;
        let thumbnail_id = self
            .thumbnail(&media, &scratch, &source, &probe)
            .await
            .context(TranscodeStage::Thumbnail)?;

        let metadata = MediaVideoMetadata {
            video_media_id: media.id,
            hls_media_id: master_id,
            thumbnail_media_id: thumbnail_id,
            duration: probe.duration,
        };
        self.finalize(&scratch, &metadata)
            .await
            .context(TranscodeStage::Finalize)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            rungs = encoded.len(),
            hls_media_id = %master_id,
            "Video transcoded to HLS"
        );
        Ok(TranscodeOutcome::Completed(metadata))
    }

    /// The artifact-present gate.
    async fn check_done(&self, media_id: MediaId) -> Result<bool> {
        self.store.video_metadata_exists(media_id).await
    }

    async fn materialize(&self, media: &Media, scratch: &ScratchDir) -> Result<PathBuf> {
        scratch.ensure().await?;
        let source = scratch.source_path(&media.extension);
        if fs::try_exists(&source).await.unwrap_or(false) {
            tracing::debug!(path = %source.display(), "Source already materialized");
            return Ok(source);
        }
        self.store.download_to(media, &source).await?;
        tracing::debug!(path = %source.display(), "Source downloaded");
        Ok(source)
    }

    /// Sources below the smallest rung still get a master and a thumbnail.
    fn select(&self, probe: &VideoProbe) -> Vec<Rung> {
        let ladder = select_ladder(probe.width, probe.height);
        if ladder.is_empty() {
            tracing::warn!(
                stage = %TranscodeStage::SelectLadder,
                width = probe.width,
                height = probe.height,
                "Source is below the smallest rendition, no rungs encoded"
            );
        }
        ladder
    }

    async fn transcode_rung(&self, scratch: &ScratchDir, source: &Path, rung: Rung) -> Result<EncodedRung> {
        let dir = scratch.rung_dir(rung.title);
        if let Some(manifest) = scratch.find_manifest(&dir).await? {
            tracing::debug!(rung = rung.title, "Rung already transcoded, skipping");
            return Ok(EncodedRung { rung, dir, manifest });
        }

        let dir = scratch.reset_rung_dir(rung.title).await?;
        self.toolchain.encode_hls_rung(source, &dir, &rung).await?;

        let mut renames = HashMap::new();
        for file in ScratchDir::list(&dir).await? {
            if !file.ends_with(".ts") {
                continue;
            }
            let new_name = MediaId::new().with_extension("ts").to_string();
            fs::rename(dir.join(&file), dir.join(&new_name)).await?;
            renames.insert(file, new_name);
        }

        let index = dir.join("index.m3u8");
        let text = fs::read_to_string(&index)
            .await
            .with_context(|| format!("Encoder produced no manifest in {}", dir.display()))?;
        fs::write(&index, rewrite_segments(&text, &renames)).await?;

        // Renaming the manifest marks the rung finished.
        let manifest = MediaId::new().with_extension("m3u8").to_string();
        fs::rename(&index, dir.join(&manifest)).await?;

        tracing::debug!(rung = rung.title, segments = renames.len(), "Rung transcoded");
        Ok(EncodedRung { rung, dir, manifest })
    }

    async fn master(&self, scratch: &ScratchDir, encoded: &[EncodedRung]) -> Result<String> {
        if let Some(existing) = scratch.find_master().await? {
            return Ok(existing);
        }
        let variants: Vec<(Rung, String)> = encoded
            .iter()
            .map(|e| (e.rung, e.manifest.clone()))
            .collect();
        let name = MediaId::new().with_extension("m3u8").to_string();
        let partial = scratch.root().join("master.partial");
        fs::write(&partial, master_manifest(&variants)).await?;
        fs::rename(&partial, scratch.root().join(&name)).await?;
        Ok(name)
    }

    async fn upload(&self, media: &Media, scratch: &ScratchDir, master: &str, encoded: &[EncodedRung]) -> Result<()> {
        self.upload_derived(media, &scratch.root().join(master), master)
            .await?;
        for rung in encoded {
            for file in ScratchDir::list(&rung.dir).await? {
                self.upload_derived(media, &rung.dir.join(&file), &file).await?;
            }
            tracing::debug!(rung = rung.rung.title, "Rung uploaded");
        }
        Ok(())
    }

    async fn upload_derived(&self, source: &Media, path: &Path, file_name: &str) -> Result<MediaId> {
        let name: MediaName = file_name
            .parse()
            .with_context(|| format!("Unexpected file in scratch directory: {}", file_name))?;
        let new = NewMedia::derived(name.id, name.extension, source);
        Ok(self.store.upload_file(new, path).await?.id)
    }

    /// source → master → rung manifest → segment. Returns the master id.
    async fn link_graph(&self, media: &Media, master: &str, encoded: &[EncodedRung]) -> Result<MediaId> {
        let master_id = master.parse::<MediaName>()?.id;
        self.store.create_dependency(media.id, master_id).await?;

        for rung in encoded {
            let manifest_id = rung.manifest.parse::<MediaName>()?.id;
            self.store.create_dependency(master_id, manifest_id).await?;
            for file in ScratchDir::list(&rung.dir).await? {
                if file == rung.manifest {
                    continue;
                }
                let segment_id = file.parse::<MediaName>()?.id;
                self.store.create_dependency(manifest_id, segment_id).await?;
            }
        }
        Ok(master_id)
    }

    async fn thumbnail(&self, media: &Media, scratch: &ScratchDir, source: &Path, probe: &VideoProbe) -> Result<MediaId> {
        let name = match scratch.find_thumbnail().await? {
            Some(existing) => existing,
            None => {
                let name = MediaId::new().with_extension("jpg").to_string();
                let partial = scratch.root().join("thumbnail.partial.jpg");
                self.toolchain
                    .screenshot(source, &partial, probe.duration * 0.5, self.settings.thumbnail_width)
                    .await?;
                fs::rename(&partial, scratch.root().join(&name)).await?;
                name
            }
        };

        let thumbnail_id = self
            .upload_derived(media, &scratch.root().join(&name), &name)
            .await?;
        self.store.create_dependency(media.id, thumbnail_id).await?;
        Ok(thumbnail_id)
    }

    async fn finalize(&self, scratch: &ScratchDir, metadata: &MediaVideoMetadata) -> Result<()> {
        scratch.remove().await?;
        self.store.insert_video_metadata(metadata).await
    }
}
