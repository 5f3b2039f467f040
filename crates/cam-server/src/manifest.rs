//! TOML shot manifests.
//!
//! A shot file describes one run of the experiment-control sequence. Each
//! camera reads its own section; a camera the file does not mention is
//! disabled for the shot.
//!
//! ```toml
//! [cameras.PCO_EDGE]
//! exposure_us = 2200
//! trigger = "external"
//! polarity = "rising"
//! roi = { left = 800, top = 750, right = 1400, bottom = 1300 }
//! exposures = ["t0", "t1", "t2"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use cam_core::{CamError, CamResult, CameraConfig, ManifestSource, ShotManifest};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ShotFile {
    #[serde(default)]
    cameras: BTreeMap<String, CameraShot>,
}

#[derive(Debug, Deserialize)]
struct CameraShot {
    #[serde(flatten)]
    config: CameraConfig,
    #[serde(default)]
    exposures: Vec<String>,
}

/// Loads per-camera manifests from TOML shot files.
#[derive(Debug, Default, Clone)]
pub struct TomlManifestSource;

impl TomlManifestSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ManifestSource for TomlManifestSource {
    async fn load(&self, camera: &str, path: &Path) -> CamResult<ShotManifest> {
        let raw = tokio::fs::read_to_string(path).await?;
        let mut shot: ShotFile = toml::from_str(&raw)
            .map_err(|e| CamError::Manifest(format!("{}: {e}", path.display())))?;

        match shot.cameras.remove(camera) {
            Some(entry) => {
                debug!(camera, exposures = entry.exposures.len(), "manifest loaded");
                Ok(ShotManifest {
                    config: entry.config,
                    exposures: entry.exposures.into(),
                })
            }
            None => {
                debug!(camera, "shot file does not mention this camera; disabled");
                Ok(ShotManifest {
                    config: CameraConfig::default(),
                    exposures: Vec::new().into(),
                })
            }
        }
    }
}
