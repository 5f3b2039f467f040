//! Acquisition controller: arm, collect, disarm.
//!
//! Owns one camera link and its buffer pool, and turns hardware readiness
//! signals into a bounded sequence of labeled frames. All hardware-facing
//! errors are caught at this boundary: the failing operation triggers an
//! implicit disarm/release before the error propagates, so a crashed epoch
//! never leaves the camera armed.

use std::sync::Arc;
use std::time::Duration;

use cam_core::{
    CamError, CamResult, CameraConfig, CameraLink, CollectionResult, EpochStatus,
    ExposureManifest, LabeledFrame,
};
use cam_pool::{BufferPool, PoolCounts};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;

/// Bounds on the collect loop's waiting.
#[derive(Debug, Clone, Copy)]
pub struct CollectTiming {
    /// Maximum wait for each expected exposure before the epoch is cut
    /// short as `Partial`.
    pub frame_timeout: Duration,
    /// Cadence of the readiness poll while waiting.
    pub poll_interval: Duration,
}

impl Default for CollectTiming {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Drives one camera through configure / arm / collect / disarm.
pub struct AcquisitionController {
    link: Arc<dyn CameraLink>,
    pool: BufferPool,
    staged: Option<CameraConfig>,
    armed: bool,
    timing: CollectTiming,
    cancel: CancelHandle,
}

impl AcquisitionController {
    pub fn new(link: Arc<dyn CameraLink>, timing: CollectTiming) -> Self {
        let pool = BufferPool::new(link.clone());
        Self {
            link,
            pool,
            staged: None,
            armed: false,
            timing,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for cancelling a blocked collect from another control path.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Pool slot counts, for diagnostics and invariant checks.
    pub fn pool_counts(&self) -> PoolCounts {
        self.pool.counts()
    }

    /// Validate and stage camera parameters without touching the armed
    /// state.
    ///
    /// Exposure is range-checked against the link capabilities and the ROI
    /// against the sensor; violations surface as `CamError::Config` with no
    /// hardware state changed.
    pub async fn configure(&mut self, config: CameraConfig) -> CamResult<()> {
        let caps = self.link.capabilities();
        if config.exposure_us < caps.min_exposure_us || config.exposure_us > caps.max_exposure_us {
            return Err(CamError::Config(format!(
                "exposure {}us outside hardware range [{}, {}]us",
                config.exposure_us, caps.min_exposure_us, caps.max_exposure_us
            )));
        }
        if let Some(roi) = &config.roi {
            if !roi.fits_sensor(caps.sensor_width, caps.sensor_height) {
                return Err(CamError::Config(format!(
                    "ROI {roi:?} outside the {}x{} sensor",
                    caps.sensor_width, caps.sensor_height
                )));
            }
        }
        debug!(exposure_us = config.exposure_us, trigger = config.trigger.as_str(), "configuration staged");
        self.staged = Some(config);
        Ok(())
    }

    /// Allocate and pre-queue `buffer_count` buffers, then put the camera
    /// into trigger-wait mode.
    ///
    /// Arming an already-armed camera disarms it first. Any failure leaves
    /// the camera disarmed with its buffers released.
    pub async fn arm(&mut self, buffer_count: usize) -> CamResult<()> {
        if self.armed {
            warn!("arm requested but the camera is already armed; disarming first");
            self.disarm().await?;
        }
        if self.staged.is_none() {
            return Err(CamError::Config("no configuration staged before arm".into()));
        }

        if let Err(e) = self.arm_inner(buffer_count).await {
            // Leave the hardware disarmed and the pool released; the
            // cleanup's own outcome is secondary to the original error.
            if let Err(cleanup) = self.disarm().await {
                warn!(error = %cleanup, "disarm failed while recovering from a failed arm");
            }
            return Err(e);
        }
        self.cancel.reset();
        self.armed = true;
        info!(buffer_count, "camera armed, waiting for triggers");
        Ok(())
    }

    async fn arm_inner(&mut self, buffer_count: usize) -> CamResult<()> {
        let config = self
            .staged
            .clone()
            .ok_or_else(|| CamError::Config("no configuration staged before arm".into()))?;
        self.link.apply_settings(&config).await?;
        self.pool.allocate(buffer_count).await?;
        for index in 0..buffer_count {
            self.pool.enqueue(index).await?;
        }
        self.link.arm().await?;
        Ok(())
    }

    /// The core acquisition loop: wait (bounded) for one buffer per
    /// expected exposure, drain it, and label it with the manifest entry.
    ///
    /// A timeout waiting for any single exposure stops the epoch early as
    /// `Partial` with the frames retrieved so far, bounding latency when
    /// the trigger train is cut short externally. A cancellation observed
    /// between polls ends the epoch as `Aborted` and discards the partial
    /// frames.
    pub async fn collect(&mut self, manifest: &ExposureManifest) -> CamResult<CollectionResult> {
        let mut frames: Vec<LabeledFrame> = Vec::with_capacity(manifest.len());
        let mut status = EpochStatus::Complete;

        'manifest: for label in manifest.labels() {
            let deadline = Instant::now() + self.timing.frame_timeout;
            loop {
                if self.cancel.is_cancelled() {
                    info!(retrieved = frames.len(), "collection cancelled");
                    status = EpochStatus::Aborted;
                    break 'manifest;
                }
                if let Some(index) = self.pool.poll_ready().await? {
                    let frame = self.pool.drain(index).await?;
                    frames.push(LabeledFrame {
                        label: label.clone(),
                        frame,
                    });
                    continue 'manifest;
                }
                if Instant::now() >= deadline {
                    warn!(
                        expected = manifest.len(),
                        retrieved = frames.len(),
                        timeout_ms = self.timing.frame_timeout.as_millis() as u64,
                        "timed out waiting for exposure; reporting partial epoch"
                    );
                    status = EpochStatus::Partial;
                    break 'manifest;
                }
                tokio::time::sleep(self.timing.poll_interval).await;
            }
        }

        if status == EpochStatus::Aborted {
            frames.clear();
        }
        debug!(retrieved = frames.len(), status = status.as_str(), "collection finished");
        Ok(CollectionResult { frames, status })
    }

    /// Stop recording and release all buffers.
    ///
    /// Always safe to call regardless of current state; failure recovery
    /// paths call it unconditionally. Both the hardware disarm and the pool
    /// release are attempted even if one fails.
    pub async fn disarm(&mut self) -> CamResult<()> {
        let disarmed = self.link.disarm().await;
        let released = self.pool.release().await;
        self.armed = false;
        disarmed?;
        released?;
        Ok(())
    }
}
