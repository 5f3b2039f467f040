//! Server configuration.
//!
//! Loaded with figment: a TOML file merged with `CAM_SERVER_`-prefixed
//! environment variables, so deployments can override individual fields
//! without editing the file.
//!
//! ```toml
//! data_dir = "/data/shots"
//!
//! [[cameras]]
//! name = "PCO_EDGE"
//! listen = "127.0.0.1:7077"
//! buffer_count = 3
//! frame_timeout = "5s"
//! poll_interval = "1ms"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cam_core::{CamError, CamResult};
use cam_session::CollectTiming;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Root directory the raw frame store writes under.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// One entry per camera; each gets its own endpoint and session.
    pub cameras: Vec<CameraEntry>,
}

/// Configuration for one camera endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraEntry {
    /// Camera name; must match the section name in shot files.
    pub name: String,
    /// TCP address the control protocol listens on.
    pub listen: SocketAddr,
    /// Hardware buffers per epoch.
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,
    /// Maximum wait per expected exposure before the epoch goes partial.
    #[serde(default = "default_frame_timeout", with = "humantime_serde")]
    pub frame_timeout: Duration,
    /// Readiness poll cadence while waiting for an exposure.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Shot-file extension recognized as a begin request.
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,
    /// Simulated-camera demo mode: fire a trigger edge at this rate while
    /// armed. Leave unset with real hardware.
    #[serde(default)]
    pub sim_trigger_hz: Option<f64>,
}

impl CameraEntry {
    pub fn collect_timing(&self) -> CollectTiming {
        CollectTiming {
            frame_timeout: self.frame_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_buffer_count() -> usize {
    3
}

fn default_frame_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1)
}

fn default_manifest_extension() -> String {
    "toml".to_string()
}

impl ServerConfig {
    /// Load from a TOML file, with `CAM_SERVER_*` environment overrides.
    pub fn load(path: &Path) -> CamResult<Self> {
        let config: ServerConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CAM_SERVER_").split("__"))
            .extract()
            .map_err(|e| CamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CamResult<()> {
        if self.cameras.is_empty() {
            return Err(CamError::Config("no cameras configured".into()));
        }
        for camera in &self.cameras {
            if camera.buffer_count == 0 {
                return Err(CamError::Config(format!(
                    "camera {}: buffer_count must be at least 1",
                    camera.name
                )));
            }
        }
        let mut names: Vec<_> = self.cameras.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.cameras.len() {
            return Err(CamError::Config("duplicate camera names".into()));
        }
        Ok(())
    }
}
