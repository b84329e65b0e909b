//! Scratch directory of one transcode run.
//!
//! The directory survives a failed run. Finished work is recognised by file
//! names: renaming a rung's manifest to a media name is the last step of that
//! rung, so a `media_*.m3u8` file marks the rung done. The same holds for the
//! master manifest and the thumbnail at the top level.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    manifest: Regex,
    thumbnail: Regex,
}

impl ScratchDir {
    /// `{base}/{media_name}`.
    pub fn new(base: &Path, media_name: &str) -> Result<Self> {
        Ok(Self {
            root: base.join(media_name),
            manifest: Regex::new(r"^media_.+\.m3u8$")
                .context("Failed to compile manifest checkpoint regex")?,
            thumbnail: Regex::new(r"^media_.+\.jpg$")
                .context("Failed to compile thumbnail checkpoint regex")?,
        })
    }

    pub fn is_media_manifest(&self, file_name: &str) -> bool {
        self.manifest.is_match(file_name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create scratch dir {}", self.root.display()))
    }

    pub fn source_path(&self, extension: &str) -> PathBuf {
        self.root.join(format!("source.{}", extension))
    }

    pub fn rung_dir(&self, title: &str) -> PathBuf {
        self.root.join(title)
    }

    /// Finished manifest directly inside `dir`, if any.
    pub async fn find_manifest(&self, dir: &Path) -> Result<Option<String>> {
        Ok(Self::list(dir)
            .await?
            .into_iter()
            .find(|name| self.is_media_manifest(name)))
    }

    pub async fn find_master(&self) -> Result<Option<String>> {
        self.find_manifest(&self.root).await
    }

    pub async fn find_thumbnail(&self) -> Result<Option<String>> {
        Ok(Self::list(&self.root)
            .await?
            .into_iter()
            .find(|name| self.thumbnail.is_match(name)))
    }

    /// Empty the rung directory, creating it if needed.
    pub async fn reset_rung_dir(&self, title: &str) -> Result<PathBuf> {
        let dir = self.rung_dir(title);
        if fs::try_exists(&dir).await.unwrap_or(false) {
            fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// File names in `dir`, sorted. A missing directory lists as empty.
    pub async fn list(dir: &Path) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.root.display())),
        }
    }
}
