//! Frame store collaborator.
//!
//! Once an epoch closes, its labeled frames are handed to a store for
//! persistence. The storage format is the store's concern; the acquisition
//! core only defines the hand-off contract.

use std::path::Path;

use async_trait::async_trait;

use crate::error::CamResult;
use crate::frame::LabeledFrame;

/// Accepts the frames of one closed epoch for persistence.
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Persist `frames` for `camera`, associated with the shot file at
    /// `shot` that defined the epoch.
    async fn persist(&self, camera: &str, shot: &Path, frames: &[LabeledFrame]) -> CamResult<()>;
}
