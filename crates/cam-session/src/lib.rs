//! Acquisition controller and per-camera session state machine.
//!
//! Sits between the control protocol and the hardware: the
//! [`CameraSession`] enforces the idle / buffered / static lifecycle, and
//! its [`AcquisitionController`] drives the buffer pool through one
//! armed-to-disarmed cycle per epoch. Each camera gets exactly one
//! session; sessions never share hardware.

pub mod cancel;
pub mod controller;
pub mod session;

pub use cancel::CancelHandle;
pub use controller::{AcquisitionController, CollectTiming};
pub use session::{CameraSession, SessionState};
