//! Camera binding capability interface.
//!
//! Vendor SDKs (function-pointer tables, fixed-layout structs, DLL loading)
//! live behind this trait: one implementation per camera family. The
//! acquisition stack above depends only on this interface and never on a
//! vendor-specific encoding; raw hardware status words are translated by
//! the binding into [`PollStatus`] before they reach the pool.
//!
//! # Design Philosophy
//!
//! Each method:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses `CamResult` so hardware faults propagate with `?`
//! - Takes `&self`; bindings use interior mutability for device state
//!
//! # Contract
//!
//! The call order for one epoch is:
//! `apply_settings` -> `allocate_buffers` -> `queue_buffer` (per slot) ->
//! `arm` -> (`poll_status` / `read_buffer` / `queue_buffer` cycles) ->
//! `disarm` -> `cancel_queued` -> `free_buffers`.
//!
//! `disarm`, `cancel_queued`, and `free_buffers` are idempotent and
//! non-blocking on already-clean state: failure recovery paths call them
//! unconditionally.

use async_trait::async_trait;

use crate::config::CameraConfig;
use crate::error::CamResult;
use crate::frame::{Frame, FrameShape};

/// Readiness of a hardware buffer, as reported by the binding layer.
///
/// Replaces raw status words (e.g. the pco buffer-event flag) with a named
/// enumeration the pool can reason over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No frame has landed in this buffer yet.
    Pending,
    /// The hardware signaled completion; the buffer holds valid data.
    Ready,
    /// The device reported a fault for this buffer.
    Error,
}

/// Hardware limits advertised by a camera binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCapabilities {
    /// Full sensor width in pixels.
    pub sensor_width: u32,
    /// Full sensor height in pixels.
    pub sensor_height: u32,
    /// Significant bits per pixel.
    pub bit_depth: u16,
    /// Minimum integration time in microseconds.
    pub min_exposure_us: u32,
    /// Maximum integration time in microseconds.
    pub max_exposure_us: u32,
    /// Maximum number of hardware buffers that can be queued at once.
    pub max_buffers: usize,
}

/// Capability interface for one physical camera.
///
/// Implementations handle protocol-specific details (pco SC2 DLL, PVCAM,
/// GigE Vision, etc.); the session layer owns exactly one link per camera
/// and never shares it.
#[async_trait]
pub trait CameraLink: Send + Sync {
    /// Hardware limits for parameter validation. Infallible; cached at open.
    fn capabilities(&self) -> LinkCapabilities;

    /// Open the connection to the device.
    async fn open(&self) -> CamResult<()>;

    /// Close the connection. Disarms first if necessary.
    async fn close(&self) -> CamResult<()>;

    /// Push staged settings (exposure, trigger routing, ROI) to the device.
    ///
    /// Legal only while disarmed. Does not change the armed state.
    async fn apply_settings(&self, config: &CameraConfig) -> CamResult<()>;

    /// Reserve `count` same-sized frame buffers on the device.
    ///
    /// Returns the negotiated frame geometry (the device may round the ROI).
    /// Fails with `CamError::Allocation` if the device rejects the sizing or
    /// the count exceeds its buffer ceiling.
    async fn allocate_buffers(&self, count: usize) -> CamResult<FrameShape>;

    /// Release all device buffers. Idempotent.
    async fn free_buffers(&self) -> CamResult<()>;

    /// Hand buffer `index` to the hardware trigger path.
    async fn queue_buffer(&self, index: usize) -> CamResult<()>;

    /// Cancel all in-flight buffer operations. Idempotent.
    async fn cancel_queued(&self) -> CamResult<()>;

    /// Non-blocking readiness check for buffer `index`.
    async fn poll_status(&self, index: usize) -> CamResult<PollStatus>;

    /// Copy the contents of buffer `index` out of the device.
    async fn read_buffer(&self, index: usize) -> CamResult<Frame>;

    /// Start recording: the device begins honoring trigger edges.
    ///
    /// Returns once the hardware acknowledges readiness.
    async fn arm(&self) -> CamResult<()>;

    /// Stop recording. Idempotent and safe to call from failure paths.
    async fn disarm(&self) -> CamResult<()>;
}
