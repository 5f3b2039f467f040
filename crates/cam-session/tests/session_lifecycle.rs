//! End-to-end lifecycle tests driving a session against the simulated
//! pco.edge binding.

use std::sync::Arc;
use std::time::Duration;

use cam_core::{
    CamError, CameraConfig, CameraLink, EpochStatus, Roi, ShotManifest, TriggerMode,
    TriggerPolarity,
};
use cam_driver_pco::{PcoEdgeLink, TriggerBench};
use cam_session::{CameraSession, CollectTiming, SessionState};

fn shot(labels: &[&str]) -> ShotManifest {
    ShotManifest {
        config: CameraConfig {
            exposure_us: 2200,
            trigger: TriggerMode::External,
            polarity: TriggerPolarity::Rising,
            roi: Some(Roi {
                left: 1,
                top: 1,
                right: 16,
                bottom: 16,
            }),
        },
        exposures: labels
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into(),
    }
}

fn timing(timeout_ms: u64) -> CollectTiming {
    CollectTiming {
        frame_timeout: Duration::from_millis(timeout_ms),
        poll_interval: Duration::from_millis(1),
    }
}

async fn open_session(
    buffer_count: usize,
    timeout_ms: u64,
) -> (CameraSession, TriggerBench) {
    let (link, bench) = PcoEdgeLink::simulated();
    link.open().await.unwrap();
    let session = CameraSession::new("PCO_EDGE", link, buffer_count, timing(timeout_ms));
    (session, bench)
}

/// Fire `count` edges in the background, paced slower than the poll
/// cadence so every edge finds a queued buffer.
fn fire_paced(bench: &TriggerBench, count: usize) -> tokio::task::JoinHandle<()> {
    let bench = bench.clone();
    tokio::spawn(async move {
        for _ in 0..count {
            tokio::time::sleep(Duration::from_millis(10)).await;
            bench.fire();
        }
    })
}

#[tokio::test]
async fn five_exposures_through_three_buffers_complete() {
    let (mut session, bench) = open_session(3, 2_000).await;
    session.begin(shot(&["t0", "t1", "t2", "t3", "t4"])).await.unwrap();
    assert_eq!(session.state(), SessionState::Buffered);

    let firing = fire_paced(&bench, 5);
    let result = session.finish().await.unwrap();
    firing.await.unwrap();

    assert_eq!(result.status, EpochStatus::Complete);
    assert_eq!(result.frames.len(), 5);
    let labels: Vec<_> = result.frames.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["t0", "t1", "t2", "t3", "t4"]);

    assert_eq!(session.state(), SessionState::Static);
    session.settle().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn truncated_trigger_train_reports_partial() {
    let (mut session, bench) = open_session(3, 100).await;
    session.begin(shot(&["t0", "t1", "t2", "t3", "t4"])).await.unwrap();

    let firing = fire_paced(&bench, 3);
    let result = session.finish().await.unwrap();
    firing.await.unwrap();

    assert_eq!(result.status, EpochStatus::Partial);
    assert_eq!(result.frames.len(), 3);
    assert_eq!(result.frames[2].label, "t2");

    // The session still reaches Idle.
    session.settle().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn empty_manifest_disables_epoch_without_arming() {
    let (mut session, bench) = open_session(3, 100).await;
    session.begin(shot(&[])).await.unwrap();
    assert_eq!(session.state(), SessionState::Buffered);
    assert_eq!(bench.arm_calls(), 0);

    let result = session.finish().await.unwrap();
    assert_eq!(result.status, EpochStatus::Disabled);
    assert!(result.frames.is_empty());

    session.settle().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn begin_while_buffered_is_a_protocol_error() {
    let (mut session, _bench) = open_session(3, 100).await;
    session.begin(shot(&["t0"])).await.unwrap();

    let err = session.begin(shot(&["t0"])).await.unwrap_err();
    assert!(matches!(err, CamError::Protocol(_)));
    assert_eq!(session.state(), SessionState::Buffered);
}

#[tokio::test]
async fn finish_from_idle_is_a_protocol_error() {
    let (mut session, _bench) = open_session(3, 100).await;
    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, CamError::Protocol(_)));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn fault_during_collect_aborts_back_to_idle() {
    let (mut session, bench) = open_session(3, 500).await;
    session.begin(shot(&["t0", "t1"])).await.unwrap();

    bench.inject_fault();
    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, CamError::Hardware(_)));

    // Implicit abort: idle again, camera disarmed, every buffer free.
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!bench.is_armed());
    let counts = session.pool_counts();
    assert_eq!(counts.free, 3);
    assert_eq!(counts.total(), 3);

    // The crashed epoch left the session re-armable.
    bench.clear_fault();
    session.begin(shot(&["t0"])).await.unwrap();
    assert_eq!(session.state(), SessionState::Buffered);
}

#[tokio::test]
async fn abort_is_idempotent() {
    let (mut session, bench) = open_session(3, 100).await;

    // Abort from Idle is a no-op.
    session.abort().await;
    assert_eq!(session.state(), SessionState::Idle);

    session.begin(shot(&["t0"])).await.unwrap();
    session.abort().await;
    session.abort().await;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!bench.is_armed());
}

#[tokio::test]
async fn external_abort_cancels_a_blocked_collect() {
    let (mut session, bench) = open_session(3, 10_000).await;
    session.begin(shot(&["t0", "t1", "t2"])).await.unwrap();

    // No edges will arrive; cancel from another control path while the
    // collect loop is blocked waiting for the first exposure.
    let cancel = session.cancel_handle();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    let result = session.finish().await.unwrap();
    canceller.await.unwrap();

    assert_eq!(result.status, EpochStatus::Aborted);
    assert!(result.frames.is_empty());
    assert_eq!(session.state(), SessionState::Idle);
    let _ = bench;
}

#[tokio::test]
async fn consecutive_epochs_reuse_the_session() {
    let (mut session, bench) = open_session(2, 1_000).await;

    for epoch in 0..3 {
        session.begin(shot(&["a", "b"])).await.unwrap();
        let firing = fire_paced(&bench, 2);
        let result = session.finish().await.unwrap();
        firing.await.unwrap();
        assert_eq!(result.status, EpochStatus::Complete, "epoch {epoch}");
        assert_eq!(result.frames.len(), 2);
        session.settle().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }
}
