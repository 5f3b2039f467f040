//! Acquisition epoch bookkeeping.
//!
//! An epoch is one armed-to-disarmed cycle: it opens when a session
//! transitions to buffered, accumulates retrieved frames during
//! collection, and is converted into a delivered [`CollectionResult`] when
//! the session goes static (or is discarded on abort).

use chrono::{DateTime, Utc};

use crate::frame::LabeledFrame;
use crate::manifest::ExposureManifest;

/// Final status of one acquisition epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochStatus {
    /// Every expected exposure was retrieved.
    Complete,
    /// The trigger train was cut short; fewer frames than expected.
    /// This is a reportable outcome, not an error.
    Partial,
    /// The epoch was cancelled; any partial frames were discarded.
    Aborted,
    /// The camera was disabled for this epoch (empty manifest); the
    /// hardware was never armed.
    Disabled,
}

impl EpochStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpochStatus::Complete => "complete",
            EpochStatus::Partial => "partial",
            EpochStatus::Aborted => "aborted",
            EpochStatus::Disabled => "disabled",
        }
    }
}

/// One open armed-to-disarmed cycle.
#[derive(Debug, Clone)]
pub struct AcquisitionEpoch {
    /// Expected exposures, read-only for the life of the epoch.
    pub manifest: ExposureManifest,
    /// Wall-clock time the session went buffered.
    pub started_at: DateTime<Utc>,
    /// Frames actually retrieved so far.
    pub retrieved: usize,
}

impl AcquisitionEpoch {
    /// Open an epoch for the given manifest.
    pub fn open(manifest: ExposureManifest) -> Self {
        Self {
            manifest,
            started_at: Utc::now(),
            retrieved: 0,
        }
    }

    /// Expected frame count.
    pub fn expected(&self) -> usize {
        self.manifest.len()
    }
}

/// Outcome of collecting one epoch: the labeled frames plus the final
/// epoch status.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub frames: Vec<LabeledFrame>,
    pub status: EpochStatus,
}

impl CollectionResult {
    /// Empty result with the given status (disabled or aborted epochs).
    pub fn empty(status: EpochStatus) -> Self {
        Self {
            frames: Vec::new(),
            status,
        }
    }
}
