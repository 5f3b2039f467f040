//! Core types and traits for the triggered-camera acquisition server.
//!
//! This crate holds everything the other workspace crates share: the error
//! taxonomy, frame and configuration data model, the camera binding
//! capability interface, exposure manifests, epoch bookkeeping, and the
//! collaborator traits (manifest source, frame store). It contains no
//! hardware logic of its own.

pub mod config;
pub mod epoch;
pub mod error;
pub mod frame;
pub mod limits;
pub mod link;
pub mod manifest;
pub mod store;

pub use config::{CameraConfig, Roi, TriggerMode, TriggerPolarity};
pub use epoch::{AcquisitionEpoch, CollectionResult, EpochStatus};
pub use error::{CamError, CamResult};
pub use frame::{Frame, FrameShape, LabeledFrame};
pub use link::{CameraLink, LinkCapabilities, PollStatus};
pub use manifest::{ExposureManifest, ManifestSource, ShotManifest};
pub use store::FrameStore;
