//! Frame store implementations.
//!
//! The persistence format is deliberately minimal: the acquisition core
//! only promises to hand `(camera, [(label, frame)])` to a store, and
//! downstream analysis owns the real format. [`RawDirStore`] writes one
//! raw little-endian dump per frame with a JSON sidecar; [`MemoryStore`]
//! keeps everything in memory for tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cam_core::{CamError, CamResult, FrameStore, LabeledFrame};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// One persisted epoch held by a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredEpoch {
    pub camera: String,
    pub shot: PathBuf,
    pub frames: Vec<LabeledFrame>,
}

/// In-memory store for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    epochs: Mutex<Vec<StoredEpoch>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything persisted so far.
    pub fn epochs(&self) -> Vec<StoredEpoch> {
        self.epochs.lock().clone()
    }
}

#[async_trait]
impl FrameStore for MemoryStore {
    async fn persist(&self, camera: &str, shot: &Path, frames: &[LabeledFrame]) -> CamResult<()> {
        self.epochs.lock().push(StoredEpoch {
            camera: camera.to_string(),
            shot: shot.to_path_buf(),
            frames: frames.to_vec(),
        });
        Ok(())
    }
}

#[derive(Serialize)]
struct FrameMeta<'a> {
    label: &'a str,
    file: String,
    width: u32,
    height: u32,
    bit_depth: u16,
}

/// Writes each epoch under `<root>/<shot stem>/<camera>/`: one
/// `<label>.raw` little-endian u16 dump per frame plus a `frames.json`
/// index describing the geometry.
#[derive(Debug, Clone)]
pub struct RawDirStore {
    root: PathBuf,
}

impl RawDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Labels become file names; keep them path-safe.
    fn sanitize(label: &str) -> String {
        label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            })
            .collect()
    }
}

#[async_trait]
impl FrameStore for RawDirStore {
    async fn persist(&self, camera: &str, shot: &Path, frames: &[LabeledFrame]) -> CamResult<()> {
        let stem = shot
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CamError::Manifest(format!("shot path {} has no stem", shot.display())))?;
        let dir = self.root.join(stem).join(camera);
        tokio::fs::create_dir_all(&dir).await?;

        let mut index = Vec::with_capacity(frames.len());
        for labeled in frames {
            let file = format!("{}.raw", Self::sanitize(&labeled.label));
            let mut bytes = Vec::with_capacity(labeled.frame.pixels.len() * 2);
            for px in &labeled.frame.pixels {
                bytes.extend_from_slice(&px.to_le_bytes());
            }
            tokio::fs::write(dir.join(&file), bytes).await?;
            index.push(FrameMeta {
                label: &labeled.label,
                file,
                width: labeled.frame.width,
                height: labeled.frame.height,
                bit_depth: labeled.frame.bit_depth,
            });
        }

        let json = serde_json::to_vec_pretty(&index)
            .map_err(|e| CamError::Manifest(format!("frame index serialization: {e}")))?;
        tokio::fs::write(dir.join("frames.json"), json).await?;
        info!(camera, frames = frames.len(), dir = %dir.display(), "epoch persisted");
        Ok(())
    }
}
