//! Per-camera session lifecycle.
//!
//! One `CameraSession` per physical camera, alive for the process
//! lifetime. The control protocol drives it through a small state
//! machine:
//!
//! ```text
//! Idle ──begin(manifest)──► Buffered ──finish()──► Static ──settle()──► Idle
//!  ▲                           │                      │
//!  └─────────── abort() ◄──────┴──────────────────────┘
//! ```
//!
//! Transitions attempted from an illegal source state fail with a
//! protocol error and leave the state unchanged. `abort` is legal from
//! every state, idempotent, and never propagates an error: it is the last
//! line of defense, so it logs and keeps going.

use std::sync::Arc;

use cam_core::{
    AcquisitionEpoch, CamError, CamResult, CameraLink, CollectionResult, EpochStatus,
    ShotManifest,
};
use cam_pool::PoolCounts;
use tracing::{error, info, warn};

use crate::cancel::CancelHandle;
use crate::controller::{AcquisitionController, CollectTiming};

/// Lifecycle state of one camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No epoch open. Initial and terminal state.
    Idle,
    /// Armed (or disabled for the epoch); trigger train may be running.
    Buffered,
    /// Epoch closed, frames collected and ready for delivery.
    Static,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Buffered => "buffered",
            SessionState::Static => "static",
        }
    }
}

/// One camera's session: owns the acquisition controller and enforces the
/// transition order.
pub struct CameraSession {
    name: String,
    controller: AcquisitionController,
    state: SessionState,
    epoch: Option<AcquisitionEpoch>,
    /// The open epoch is disabled: no hardware was armed.
    disabled: bool,
    buffer_count: usize,
}

impl CameraSession {
    /// Create a session for `name`, arming with `buffer_count` buffers per
    /// epoch.
    pub fn new(
        name: impl Into<String>,
        link: Arc<dyn CameraLink>,
        buffer_count: usize,
        timing: CollectTiming,
    ) -> Self {
        Self {
            name: name.into(),
            controller: AcquisitionController::new(link, timing),
            state: SessionState::Idle,
            epoch: None,
            disabled: false,
            buffer_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for aborting a blocked collection from another control path.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    /// Pool slot counts, for diagnostics and invariant checks.
    pub fn pool_counts(&self) -> PoolCounts {
        self.controller.pool_counts()
    }

    /// Open an epoch: configure and arm the camera for the manifest's
    /// trigger train.
    ///
    /// Only legal from `Idle`. An empty manifest leaves the camera
    /// logically disabled for the epoch: the session still goes
    /// `Buffered`, but no hardware is touched and the epoch will close as
    /// `Disabled`.
    pub async fn begin(&mut self, manifest: ShotManifest) -> CamResult<()> {
        if self.state != SessionState::Idle {
            return Err(CamError::protocol(format!(
                "begin while {}: an epoch is already open",
                self.state.as_str()
            )));
        }

        let disabled = manifest.is_disabled();
        let epoch = AcquisitionEpoch::open(manifest.exposures);

        if disabled {
            info!(camera = %self.name, "no exposures for this epoch; camera disabled");
        } else {
            self.controller.configure(manifest.config).await?;
            if let Err(e) = self.controller.arm(self.buffer_count).await {
                // A failed arm must leave the session re-armable.
                self.abort().await;
                return Err(e);
            }
        }

        self.epoch = Some(epoch);
        self.disabled = disabled;
        self.state = SessionState::Buffered;
        info!(camera = %self.name, disabled, "transition to buffered");
        Ok(())
    }

    /// Close the epoch: collect the expected exposures, disarm, and hand
    /// back the labeled frames.
    ///
    /// Only legal from `Buffered`. If collection or disarm fails, the
    /// session reaches `Idle` via an implicit abort before the error
    /// propagates. A cancelled collection closes the epoch as `Aborted`
    /// (frames discarded) and also lands in `Idle`.
    pub async fn finish(&mut self) -> CamResult<CollectionResult> {
        if self.state != SessionState::Buffered {
            return Err(CamError::protocol(format!(
                "finish while {}: no epoch open",
                self.state.as_str()
            )));
        }

        if self.disabled {
            self.state = SessionState::Static;
            info!(camera = %self.name, status = "disabled", "transition to static");
            return Ok(CollectionResult::empty(EpochStatus::Disabled));
        }

        let manifest = self
            .epoch
            .as_ref()
            .map(|e| e.manifest.clone())
            .unwrap_or_default();

        let result = match self.controller.collect(&manifest).await {
            Ok(result) => result,
            Err(e) => {
                error!(camera = %self.name, error = %e, "collection failed; aborting epoch");
                self.abort().await;
                return Err(e);
            }
        };
        if let Err(e) = self.controller.disarm().await {
            error!(camera = %self.name, error = %e, "disarm failed after collection; aborting epoch");
            self.abort().await;
            return Err(e);
        }

        if let Some(epoch) = self.epoch.as_mut() {
            epoch.retrieved = result.frames.len();
        }

        if result.status == EpochStatus::Aborted {
            self.epoch = None;
            self.state = SessionState::Idle;
            info!(camera = %self.name, "epoch aborted during collection");
        } else {
            self.state = SessionState::Static;
            info!(
                camera = %self.name,
                status = result.status.as_str(),
                retrieved = result.frames.len(),
                "transition to static"
            );
        }
        Ok(result)
    }

    /// Close a delivered epoch: `Static` back to `Idle` once the frames
    /// have been handed to the store.
    pub fn settle(&mut self) -> CamResult<()> {
        if self.state != SessionState::Static {
            return Err(CamError::protocol(format!(
                "settle while {}: no delivered epoch",
                self.state.as_str()
            )));
        }
        self.epoch = None;
        self.disabled = false;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Force the session back to `Idle`, discarding any open epoch.
    ///
    /// Legal from every state and idempotent. Cancels a blocked
    /// collection, disarms, and releases buffers; failures are logged and
    /// swallowed since this is the last line of defense.
    pub async fn abort(&mut self) {
        self.controller.cancel_handle().cancel();
        if let Err(e) = self.controller.disarm().await {
            warn!(camera = %self.name, error = %e, "disarm failed during abort");
        }
        if self.epoch.take().is_some() {
            info!(camera = %self.name, "epoch discarded by abort");
        }
        self.disabled = false;
        self.state = SessionState::Idle;
    }
}
