//! Hardware buffer pool for triggered frame acquisition.
//!
//! This crate manages the fixed set of N hardware-addressable buffers a
//! camera is armed with. Each slot moves through a small state machine:
//!
//! ```text
//! Free ──enqueue──► Queued ──poll_ready──► Ready ──drain──► Draining
//!  ▲                  ▲                                        │
//!  │                  └──────────── automatic re-queue ────────┘
//!  └──────────────────────────── release ──────────────────────┘
//! ```
//!
//! # Key Invariants
//!
//! - `|Free| + |Queued| + |Ready| + |Draining| == N` at every instant.
//! - Buffers are drained and re-queued in the order they were queued
//!   (strict FIFO), so a trigger train arriving faster than drains
//!   complete never aliases two exposures onto one slot.
//! - `drain` re-queues automatically: failing to hand a slot back to the
//!   hardware after one frame would stall every later trigger on that slot.
//!
//! # FIFO Completion Assumption
//!
//! `poll_ready` inspects only the *oldest* queued slot and assumes the
//! hardware completes buffers in queue order. If a device can complete
//! out of order this undercounts frames; the assumption is inherited from
//! the pco-family bindings and has not been validated against other
//! hardware.

use std::collections::VecDeque;
use std::sync::Arc;

use cam_core::{CamError, CamResult, CameraLink, Frame, FrameShape, PollStatus};
use cam_core::limits::MAX_BUFFER_COUNT;
use tracing::{debug, warn};

/// State of one hardware buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not handed to the hardware; holds no valid data.
    Free,
    /// Handed to the hardware trigger path, awaiting a frame.
    Queued,
    /// Hardware signaled completion; holds one valid frame.
    Ready,
    /// Being copied out.
    Draining,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Free => "Free",
            SlotState::Queued => "Queued",
            SlotState::Ready => "Ready",
            SlotState::Draining => "Draining",
        }
    }
}

/// Per-state slot counts, for invariant checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolCounts {
    pub free: usize,
    pub queued: usize,
    pub ready: usize,
    pub draining: usize,
}

impl PoolCounts {
    /// Sum over all states; always equals the pool size.
    pub fn total(&self) -> usize {
        self.free + self.queued + self.ready + self.draining
    }
}

/// Fixed pool of hardware buffers plus the FIFO of indices currently queued.
///
/// Owned exclusively by one acquisition controller; never shared between
/// cameras.
pub struct BufferPool {
    link: Arc<dyn CameraLink>,
    slots: Vec<SlotState>,
    queued: VecDeque<usize>,
    shape: Option<FrameShape>,
}

impl BufferPool {
    /// Create an empty pool bound to one camera link. No device buffers are
    /// reserved until [`allocate`](Self::allocate) is called.
    pub fn new(link: Arc<dyn CameraLink>) -> Self {
        Self {
            link,
            slots: Vec::new(),
            queued: VecDeque::new(),
            shape: None,
        }
    }

    /// Reserve `count` same-sized buffers from the device and mark them all
    /// `Free`.
    ///
    /// Fails with `CamError::Allocation` if `count` is zero, exceeds the
    /// hardware ceiling, or the device rejects the sizing. A pool that
    /// still holds buffers is released first.
    pub async fn allocate(&mut self, count: usize) -> CamResult<FrameShape> {
        if count == 0 {
            return Err(CamError::Allocation(
                "buffer count must be at least 1".into(),
            ));
        }
        let ceiling = MAX_BUFFER_COUNT.min(self.link.capabilities().max_buffers);
        if count > ceiling {
            return Err(CamError::Allocation(format!(
                "buffer count {count} exceeds hardware maximum {ceiling}"
            )));
        }
        if !self.slots.is_empty() {
            if self.counts().free != self.slots.len() {
                warn!(
                    old_size = self.slots.len(),
                    "pool re-allocated with buffers in flight; releasing"
                );
            }
            self.release().await?;
        }

        let shape = self.link.allocate_buffers(count).await?;
        // Reject geometries the shared limits rule out before a single
        // frame lands.
        let bytes = shape.byte_len()?;
        debug!(
            count,
            width = shape.width,
            height = shape.height,
            frame_bytes = bytes,
            "allocated buffer pool"
        );

        self.slots = vec![SlotState::Free; count];
        self.queued.clear();
        self.shape = Some(shape);
        self.assert_invariant();
        Ok(shape)
    }

    /// Hand buffer `index` to the hardware trigger path.
    ///
    /// Legal only from `Free` or `Draining`; anything else is a state
    /// machine violation reported as `CamError::BufferState`.
    pub async fn enqueue(&mut self, index: usize) -> CamResult<()> {
        let state = self.slot(index)?;
        match state {
            SlotState::Free | SlotState::Draining => {}
            other => {
                return Err(CamError::BufferState {
                    index,
                    expected: "Free or Draining",
                    actual: other.as_str(),
                });
            }
        }
        self.link.queue_buffer(index).await?;
        self.slots[index] = SlotState::Queued;
        self.queued.push_back(index);
        self.assert_invariant();
        Ok(())
    }

    /// Non-blocking readiness check for the oldest queued buffer.
    ///
    /// Returns `Ok(Some(index))` and transitions the slot to `Ready` when
    /// the hardware signals completion, `Ok(None)` when nothing is ready
    /// (or nothing is queued). Callers decide the polling cadence.
    pub async fn poll_ready(&mut self) -> CamResult<Option<usize>> {
        let Some(&oldest) = self.queued.front() else {
            return Ok(None);
        };
        match self.link.poll_status(oldest).await? {
            PollStatus::Pending => Ok(None),
            PollStatus::Ready => {
                self.queued.pop_front();
                self.slots[oldest] = SlotState::Ready;
                self.assert_invariant();
                Ok(Some(oldest))
            }
            PollStatus::Error => Err(CamError::hardware(format!(
                "device fault on queued buffer {oldest}"
            ))),
        }
    }

    /// Copy the `Ready` buffer `index` out and immediately re-queue it.
    ///
    /// The re-queue is mandatory: it keeps the in-flight buffer count
    /// constant so later trigger edges always find a slot.
    pub async fn drain(&mut self, index: usize) -> CamResult<Frame> {
        let state = self.slot(index)?;
        if state != SlotState::Ready {
            return Err(CamError::BufferState {
                index,
                expected: "Ready",
                actual: state.as_str(),
            });
        }
        self.slots[index] = SlotState::Draining;
        // On a read fault the slot stays Draining; the abort path's
        // release() reclaims it.
        let frame = self.link.read_buffer(index).await?;
        self.enqueue(index).await?;
        Ok(frame)
    }

    /// Cancel all in-flight operations and mark every buffer `Free`.
    ///
    /// Used on disarm and abort; idempotent, including on an empty pool.
    pub async fn release(&mut self) -> CamResult<()> {
        if self.slots.is_empty() {
            return Ok(());
        }
        self.link.cancel_queued().await?;
        self.link.free_buffers().await?;
        for slot in &mut self.slots {
            *slot = SlotState::Free;
        }
        self.queued.clear();
        self.assert_invariant();
        debug!(size = self.slots.len(), "released buffer pool");
        Ok(())
    }

    /// Number of slots in the pool (0 before allocation).
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Frame geometry negotiated at allocation, if any.
    pub fn shape(&self) -> Option<FrameShape> {
        self.shape
    }

    /// Per-state slot counts.
    pub fn counts(&self) -> PoolCounts {
        let mut counts = PoolCounts::default();
        for slot in &self.slots {
            match slot {
                SlotState::Free => counts.free += 1,
                SlotState::Queued => counts.queued += 1,
                SlotState::Ready => counts.ready += 1,
                SlotState::Draining => counts.draining += 1,
            }
        }
        counts
    }

    fn slot(&self, index: usize) -> CamResult<SlotState> {
        self.slots.get(index).copied().ok_or(CamError::BufferState {
            index,
            expected: "an allocated slot",
            actual: "unallocated",
        })
    }

    fn assert_invariant(&self) {
        debug_assert_eq!(self.counts().total(), self.slots.len());
        debug_assert_eq!(
            self.counts().queued,
            self.queued.len(),
            "queued FIFO out of sync with slot states"
        );
    }
}
