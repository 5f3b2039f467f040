//! Simulated pco.edge binding.
//!
//! Implements [`CameraLink`] with an in-memory device model: the same
//! settings validation, buffer accounting, and FIFO completion behavior
//! the SC2 binding exhibits, but with trigger edges fired from software.
//! Used for every build without the vendor SDK and for the integration
//! tests of the session and server layers.
//!
//! A [`TriggerBench`] handle stands in for the experiment-control hardware:
//! it fires trigger edges, injects device faults, and exposes counters the
//! tests assert on (arm calls, disarm calls).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use cam_core::{
    CamError, CamResult, CameraConfig, CameraLink, Frame, FrameShape, LinkCapabilities,
    PollStatus, Roi,
};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::wire;

#[derive(Default)]
struct SimBuffer {
    /// A completed exposure waiting to be read, if any.
    frame: Option<Frame>,
}

#[derive(Default)]
struct DeviceState {
    open: bool,
    armed: bool,
    settings: Option<CameraConfig>,
    shape: Option<FrameShape>,
    buffers: Vec<SimBuffer>,
    /// Device-side FIFO of queued buffer indices; edges complete the front.
    queued: VecDeque<usize>,
    fault: bool,
    frame_nr: u64,
    arm_calls: u64,
    disarm_calls: u64,
}

impl DeviceState {
    fn effective_roi(&self) -> Roi {
        self.settings
            .as_ref()
            .and_then(|s| s.roi)
            .unwrap_or_else(|| Roi::full_sensor(wire::SENSOR_WIDTH, wire::SENSOR_HEIGHT))
    }
}

/// Simulated pco.edge 4.2.
///
/// All state lives behind one mutex; no method holds the lock across an
/// await point.
pub struct PcoEdgeLink {
    state: Arc<Mutex<DeviceState>>,
}

impl PcoEdgeLink {
    /// Create a simulated camera plus the bench handle that drives it.
    pub fn simulated() -> (Arc<Self>, TriggerBench) {
        let state = Arc::new(Mutex::new(DeviceState::default()));
        let link = Arc::new(Self {
            state: state.clone(),
        });
        (link, TriggerBench { state })
    }

    /// Synthetic exposure: a deterministic diagonal gradient plus seeded
    /// noise, so frames are distinguishable and reproducible per frame
    /// number.
    fn render_frame(shape: FrameShape, frame_nr: u64) -> Frame {
        let mut rng = ChaCha8Rng::seed_from_u64(frame_nr);
        let width = shape.width as usize;
        let height = shape.height as usize;
        let mut pixels = vec![0u16; width * height];
        for (i, px) in pixels.iter_mut().enumerate() {
            let x = i % width;
            let y = i / width;
            let pattern = (((x + y) % 256) * 256) as u16;
            *px = pattern.saturating_add(rng.gen_range(0..64));
        }
        Frame {
            width: shape.width,
            height: shape.height,
            bit_depth: shape.bit_depth,
            pixels,
        }
    }
}

#[async_trait]
impl CameraLink for PcoEdgeLink {
    fn capabilities(&self) -> LinkCapabilities {
        LinkCapabilities {
            sensor_width: wire::SENSOR_WIDTH,
            sensor_height: wire::SENSOR_HEIGHT,
            bit_depth: wire::BIT_DEPTH,
            min_exposure_us: wire::MIN_EXPOSURE_US,
            max_exposure_us: wire::MAX_EXPOSURE_US,
            max_buffers: wire::MAX_BUFFERS,
        }
    }

    async fn open(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        state.open = true;
        debug!("pco.edge 4.2 (simulated) open");
        Ok(())
    }

    async fn close(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        state.armed = false;
        state.buffers.clear();
        state.queued.clear();
        state.open = false;
        debug!("pco.edge camera closed");
        Ok(())
    }

    async fn apply_settings(&self, config: &CameraConfig) -> CamResult<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(CamError::hardware("camera is not open"));
        }
        if state.armed {
            return Err(CamError::hardware("settings rejected while armed"));
        }
        if config.exposure_us < wire::MIN_EXPOSURE_US || config.exposure_us > wire::MAX_EXPOSURE_US
        {
            return Err(CamError::Config(format!(
                "exposure {}us outside [{}, {}]us",
                config.exposure_us,
                wire::MIN_EXPOSURE_US,
                wire::MAX_EXPOSURE_US
            )));
        }
        if let Some(roi) = &config.roi {
            if !roi.fits_sensor(wire::SENSOR_WIDTH, wire::SENSOR_HEIGHT) {
                return Err(CamError::Config(format!(
                    "ROI {roi:?} outside the {}x{} sensor",
                    wire::SENSOR_WIDTH,
                    wire::SENSOR_HEIGHT
                )));
            }
        }
        debug!(
            exposure_us = config.exposure_us,
            trigger_code = wire::trigger_mode_code(config.trigger),
            polarity_code = wire::trigger_polarity_code(config.polarity),
            "settings applied"
        );
        state.settings = Some(config.clone());
        Ok(())
    }

    async fn allocate_buffers(&self, count: usize) -> CamResult<FrameShape> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(CamError::hardware("camera is not open"));
        }
        if state.settings.is_none() {
            return Err(CamError::Allocation(
                "settings must be applied before buffers are sized".into(),
            ));
        }
        if count == 0 || count > wire::MAX_BUFFERS {
            return Err(CamError::Allocation(format!(
                "buffer count {count} outside [1, {}]",
                wire::MAX_BUFFERS
            )));
        }
        let roi = state.effective_roi();
        let shape = FrameShape {
            width: roi.width(),
            height: roi.height(),
            bit_depth: wire::BIT_DEPTH,
        };
        state.buffers = (0..count).map(|_| SimBuffer::default()).collect();
        state.queued.clear();
        state.shape = Some(shape);
        debug!(count, width = shape.width, height = shape.height, "buffers allocated");
        Ok(shape)
    }

    async fn free_buffers(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        state.buffers.clear();
        state.queued.clear();
        state.shape = None;
        Ok(())
    }

    async fn queue_buffer(&self, index: usize) -> CamResult<()> {
        let mut state = self.state.lock();
        if index >= state.buffers.len() {
            return Err(CamError::hardware(format!(
                "queue of unallocated buffer {index}"
            )));
        }
        state.buffers[index].frame = None;
        state.queued.push_back(index);
        Ok(())
    }

    async fn cancel_queued(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        state.queued.clear();
        for buffer in &mut state.buffers {
            buffer.frame = None;
        }
        Ok(())
    }

    async fn poll_status(&self, index: usize) -> CamResult<PollStatus> {
        let state = self.state.lock();
        if state.fault {
            return Ok(PollStatus::Error);
        }
        match state.buffers.get(index) {
            Some(buffer) if buffer.frame.is_some() => Ok(PollStatus::Ready),
            Some(_) => Ok(PollStatus::Pending),
            None => Err(CamError::hardware(format!(
                "poll of unallocated buffer {index}"
            ))),
        }
    }

    async fn read_buffer(&self, index: usize) -> CamResult<Frame> {
        let mut state = self.state.lock();
        let buffer = state
            .buffers
            .get_mut(index)
            .ok_or_else(|| CamError::hardware(format!("read of unallocated buffer {index}")))?;
        buffer
            .frame
            .take()
            .ok_or_else(|| CamError::hardware(format!("buffer {index} holds no frame")))
    }

    async fn arm(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(CamError::hardware("camera is not open"));
        }
        if state.fault {
            return Err(CamError::hardware("device fault: arm rejected"));
        }
        if state.buffers.is_empty() {
            return Err(CamError::hardware("arm without allocated buffers"));
        }
        state.armed = true;
        state.arm_calls += 1;
        debug!("recording on, waiting for triggers");
        Ok(())
    }

    async fn disarm(&self) -> CamResult<()> {
        let mut state = self.state.lock();
        state.armed = false;
        state.disarm_calls += 1;
        Ok(())
    }
}

/// Software stand-in for the experiment-control trigger line.
///
/// Cloneable; shares state with the link it was created with.
#[derive(Clone)]
pub struct TriggerBench {
    state: Arc<Mutex<DeviceState>>,
}

impl TriggerBench {
    /// Fire one trigger edge: the oldest queued buffer completes with a
    /// synthetic exposure. Edges are dropped (with a warning) when the
    /// camera is not recording or no buffer is queued, as real hardware
    /// drops them.
    pub fn fire(&self) {
        let mut state = self.state.lock();
        if !state.armed {
            warn!("trigger edge dropped: camera not armed");
            return;
        }
        let Some(index) = state.queued.pop_front() else {
            warn!("trigger edge dropped: no buffer queued");
            return;
        };
        let Some(shape) = state.shape else {
            warn!("trigger edge dropped: no negotiated frame shape");
            return;
        };
        state.frame_nr += 1;
        let frame = PcoEdgeLink::render_frame(shape, state.frame_nr);
        state.buffers[index].frame = Some(frame);
    }

    /// Fire `count` edges back to back.
    pub fn fire_n(&self, count: usize) {
        for _ in 0..count {
            self.fire();
        }
    }

    /// Put the device into a fault state: polls report `PollStatus::Error`
    /// and arming fails.
    pub fn inject_fault(&self) {
        self.state.lock().fault = true;
    }

    /// Clear an injected fault.
    pub fn clear_fault(&self) {
        self.state.lock().fault = false;
    }

    /// Whether the device is currently recording.
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Number of arm calls the device has seen.
    pub fn arm_calls(&self) -> u64 {
        self.state.lock().arm_calls
    }

    /// Number of disarm calls the device has seen.
    pub fn disarm_calls(&self) -> u64 {
        self.state.lock().disarm_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cam_core::TriggerMode;

    fn external_config() -> CameraConfig {
        CameraConfig {
            exposure_us: 2200,
            trigger: TriggerMode::External,
            polarity: cam_core::TriggerPolarity::Rising,
            roi: Some(Roi {
                left: 1,
                top: 1,
                right: 32,
                bottom: 16,
            }),
        }
    }

    #[tokio::test]
    async fn test_settings_validation() {
        let (link, _bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();

        let mut config = external_config();
        config.exposure_us = 10; // below the 100us floor
        let err = link.apply_settings(&config).await.unwrap_err();
        assert!(matches!(err, CamError::Config(_)));

        let mut config = external_config();
        config.roi = Some(Roi {
            left: 1,
            top: 1,
            right: 4096,
            bottom: 16,
        });
        let err = link.apply_settings(&config).await.unwrap_err();
        assert!(matches!(err, CamError::Config(_)));

        link.apply_settings(&external_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_allocate_respects_roi() {
        let (link, _bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        link.apply_settings(&external_config()).await.unwrap();
        let shape = link.allocate_buffers(3).await.unwrap();
        assert_eq!(shape.width, 32);
        assert_eq!(shape.height, 16);
    }

    #[tokio::test]
    async fn test_allocate_requires_settings() {
        let (link, _bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        let err = link.allocate_buffers(3).await.unwrap_err();
        assert!(matches!(err, CamError::Allocation(_)));
    }

    #[tokio::test]
    async fn test_trigger_edge_completes_oldest_queued() {
        let (link, bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        link.apply_settings(&external_config()).await.unwrap();
        link.allocate_buffers(2).await.unwrap();
        link.queue_buffer(0).await.unwrap();
        link.queue_buffer(1).await.unwrap();
        link.arm().await.unwrap();

        assert_eq!(link.poll_status(0).await.unwrap(), PollStatus::Pending);
        bench.fire();
        assert_eq!(link.poll_status(0).await.unwrap(), PollStatus::Ready);
        assert_eq!(link.poll_status(1).await.unwrap(), PollStatus::Pending);

        let frame = link.read_buffer(0).await.unwrap();
        assert_eq!(frame.pixels.len(), 32 * 16);
        // A second read of the same buffer has nothing to return.
        assert!(link.read_buffer(0).await.is_err());
    }

    #[tokio::test]
    async fn test_edges_dropped_when_not_armed() {
        let (link, bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        link.apply_settings(&external_config()).await.unwrap();
        link.allocate_buffers(1).await.unwrap();
        link.queue_buffer(0).await.unwrap();

        bench.fire(); // not armed: dropped
        assert_eq!(link.poll_status(0).await.unwrap(), PollStatus::Pending);
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let (link, bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        link.disarm().await.unwrap();
        link.disarm().await.unwrap();
        assert!(!bench.is_armed());
        assert_eq!(bench.disarm_calls(), 2);
    }

    #[tokio::test]
    async fn test_fault_blocks_arm() {
        let (link, bench) = PcoEdgeLink::simulated();
        link.open().await.unwrap();
        link.apply_settings(&external_config()).await.unwrap();
        link.allocate_buffers(1).await.unwrap();
        bench.inject_fault();
        assert!(link.arm().await.is_err());
        bench.clear_fault();
        assert!(link.arm().await.is_ok());
    }

    #[tokio::test]
    async fn test_frames_differ_between_exposures() {
        let shape = FrameShape {
            width: 16,
            height: 16,
            bit_depth: 16,
        };
        let a = PcoEdgeLink::render_frame(shape, 1);
        let b = PcoEdgeLink::render_frame(shape, 2);
        assert_ne!(a.pixels, b.pixels);
        // Same seed reproduces the same exposure.
        assert_eq!(a, PcoEdgeLink::render_frame(shape, 1));
    }
}
