//! Exposure manifests and their source.
//!
//! The experiment-control sequence decides, per shot, how many exposures a
//! camera will see and what each one is called. That decision arrives as a
//! shot file on disk; a [`ManifestSource`] resolves the file into a
//! [`ShotManifest`] for one camera. An empty exposure list means the camera
//! is disabled for that shot.

use std::path::Path;

use async_trait::async_trait;

use crate::config::CameraConfig;
use crate::error::CamResult;

/// Ordered sequence of expected exposure labels for one acquisition epoch.
///
/// Read-only during an epoch; its length is the expected frame count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExposureManifest {
    labels: Vec<String>,
}

impl ExposureManifest {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Expected frame count for the epoch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the camera is disabled for this epoch.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in trigger order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl From<Vec<String>> for ExposureManifest {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

/// Everything the sequence definition says about one camera for one shot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotManifest {
    /// Camera settings for this shot.
    pub config: CameraConfig,
    /// Expected exposures, in trigger order. Empty = camera disabled.
    pub exposures: ExposureManifest,
}

impl ShotManifest {
    /// True if the camera takes no part in this shot.
    pub fn is_disabled(&self) -> bool {
        self.exposures.is_empty()
    }
}

/// Resolves a staged shot path into the manifest for one camera.
///
/// External collaborator: the sequence definition format (h5, TOML, ...)
/// is the source's concern, not the acquisition core's.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Load the manifest for `camera` from the shot file at `path`.
    ///
    /// A shot file that does not mention the camera yields a disabled
    /// manifest (empty exposure list), not an error.
    async fn load(&self, camera: &str, path: &Path) -> CamResult<ShotManifest>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_manifest_is_disabled() {
        let manifest = ExposureManifest::default();
        assert!(manifest.is_empty());
        assert_eq!(manifest.len(), 0);
    }

    #[test]
    fn test_labels_preserve_order() {
        let manifest = ExposureManifest::new(vec!["t0".into(), "t1".into(), "t2".into()]);
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.labels()[2], "t2");
    }
}
