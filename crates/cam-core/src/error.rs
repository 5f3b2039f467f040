//! Custom error types for the acquisition stack.
//!
//! This module defines the primary error type, `CamError`, shared by every
//! crate in the workspace. Using the `thiserror` crate, it provides a
//! centralized and consistent way to handle the different kinds of errors a
//! triggered acquisition can produce, from invalid configuration to device
//! rejections and illegal protocol transitions.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: a parameter failed validation (exposure out of the
//!   hardware range, ROI outside the sensor). Surfaced immediately, no
//!   hardware state changed.
//! - **`Allocation`**: the device rejected buffer sizing or count. Surfaced
//!   after an implicit release.
//! - **`Hardware`**: the device could not be armed, polled, or read.
//!   Surfaced after an implicit disarm/release.
//! - **`Protocol`**: an illegal request or an illegal state transition.
//!   Surfaced without side effects; state is left unchanged.
//! - **`Busy`**: a `begin` arrived while an epoch is already open. Concurrent
//!   epochs on one camera are never valid, so the request is rejected.
//! - **`BufferState`**: a pool operation was applied to a slot in the wrong
//!   state (e.g. draining a slot that is not ready).
//!
//! Note that a `Partial` acquisition is *not* an error: an epoch that times
//! out with fewer frames than expected is a reportable outcome carried by
//! [`crate::EpochStatus`].
//!
//! By using `#[from]` for I/O errors, `CamError` composes with the `?`
//! operator throughout the state machine instead of ad hoc catch sites.

use thiserror::Error;

/// Convenience alias for results using the workspace error type.
pub type CamResult<T> = std::result::Result<T, CamError>;

#[derive(Error, Debug)]
pub enum CamError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("buffer allocation failed: {0}")]
    Allocation(String),

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("camera busy: an acquisition epoch is already open")]
    Busy,

    #[error("buffer {index} is {actual}, expected {expected}")]
    BufferState {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("frame dimensions {width}x{height} exceed the {max_dimension} pixel limit")]
    FrameDimensionsTooLarge {
        width: u32,
        height: u32,
        max_dimension: u32,
    },

    #[error("frame of {bytes} bytes exceeds the {max_bytes} byte limit")]
    FrameTooLarge { bytes: usize, max_bytes: usize },

    #[error("size overflow computing {context}")]
    SizeOverflow { context: &'static str },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CamError {
    /// Shorthand for a protocol violation with a formatted message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        CamError::Protocol(msg.into())
    }

    /// Shorthand for a hardware fault with a formatted message.
    pub fn hardware(msg: impl Into<String>) -> Self {
        CamError::Hardware(msg.into())
    }
}
