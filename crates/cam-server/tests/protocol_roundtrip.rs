//! Wire-level protocol tests: a client drives a camera endpoint over an
//! in-memory duplex stream, with trigger edges fired from the test bench.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cam_core::CameraLink;
use cam_driver_pco::{PcoEdgeLink, TriggerBench};
use cam_server::{CameraEndpoint, MemoryStore, TomlManifestSource};
use cam_session::{CameraSession, CollectTiming, SessionState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

const CAMERA: &str = "PCO_EDGE";

struct Client {
    reader: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    fn new(stream: DuplexStream) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> String {
        self.reader.next_line().await.unwrap().expect("server hung up")
    }

    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.recv().await
    }

    /// The two-phase staged request: expect `ok`, acknowledge, expect the
    /// final response.
    async fn staged_request(&mut self, line: &str) -> String {
        let first = self.request(line).await;
        assert_eq!(first, "ok", "unexpected first response: {first}");
        self.send("ack").await;
        self.recv().await
    }
}

struct Fixture {
    client: Client,
    bench: TriggerBench,
    store: Arc<MemoryStore>,
    server: JoinHandle<CameraEndpoint>,
    shot_path: String,
    _shot_dir: tempfile::TempDir,
}

async fn fixture(shot_contents: &str, timeout: Duration) -> Fixture {
    let shot_dir = tempfile::tempdir().unwrap();
    let shot_path = shot_dir.path().join("run_001.toml");
    std::fs::write(&shot_path, shot_contents).unwrap();

    let (link, bench) = PcoEdgeLink::simulated();
    link.open().await.unwrap();
    let session = CameraSession::new(
        CAMERA,
        link,
        3,
        CollectTiming {
            frame_timeout: timeout,
            poll_interval: Duration::from_millis(1),
        },
    );
    let store = Arc::new(MemoryStore::new());
    let mut endpoint = CameraEndpoint::new(
        session,
        Arc::new(TomlManifestSource::new()),
        store.clone(),
        "toml",
    );

    let (client_io, server_io) = tokio::io::duplex(1 << 16);
    let server = tokio::spawn(async move {
        endpoint.serve(server_io).await.unwrap();
        endpoint
    });

    Fixture {
        client: Client::new(client_io),
        bench,
        store,
        server,
        shot_path: shot_path.to_str().unwrap().to_string(),
        _shot_dir: shot_dir,
    }
}

fn two_exposure_shot() -> String {
    format!(
        r#"
        [cameras.{CAMERA}]
        exposure_us = 2200
        trigger = "external"
        roi = {{ left = 1, top = 1, right = 16, bottom = 16 }}
        exposures = ["t0", "t1"]
        "#
    )
}

#[tokio::test]
async fn hello_round_trip() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;
    assert_eq!(fx.client.request("hello").await, "hello");
}

#[tokio::test]
async fn full_shot_cycle_persists_labeled_frames() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_secs(2)).await;

    let resp = fx.client.staged_request(&fx.shot_path.clone()).await;
    assert_eq!(resp, "done");
    assert!(fx.bench.is_armed());

    fx.bench.fire_n(2);
    let resp = fx.client.staged_request("done").await;
    assert_eq!(resp, "done");

    let epochs = fx.store.epochs();
    assert_eq!(epochs.len(), 1);
    assert_eq!(epochs[0].camera, CAMERA);
    assert_eq!(epochs[0].frames.len(), 2);
    assert_eq!(epochs[0].frames[0].label, "t0");
    assert_eq!(epochs[0].frames[1].label, "t1");
    assert!(!fx.bench.is_armed());

    // Dropping the client ends the connection; the endpoint comes back idle.
    drop(fx.client);
    let endpoint = fx.server.await.unwrap();
    assert_eq!(endpoint.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn truncated_train_persists_partial_epoch() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(100)).await;

    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
    fx.bench.fire_n(1);
    assert_eq!(fx.client.staged_request("done").await, "done");

    let epochs = fx.store.epochs();
    assert_eq!(epochs.len(), 1);
    assert_eq!(epochs[0].frames.len(), 1);
    assert_eq!(epochs[0].frames[0].label, "t0");
}

#[tokio::test]
async fn abort_closes_the_epoch_and_allows_a_new_one() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;

    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
    assert_eq!(fx.client.request("abort").await, "ok");
    assert!(!fx.bench.is_armed());
    assert!(fx.store.epochs().is_empty());

    // Aborting again is fine, and a new shot can begin.
    assert_eq!(fx.client.request("abort").await, "ok");
    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
}

#[tokio::test]
async fn invalid_request_is_rejected_without_side_effects() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;

    let resp = fx.client.request("snap").await;
    assert!(resp.starts_with("error"), "unexpected response: {resp}");
    assert!(resp.contains("invalid request"));

    // The endpoint still answers.
    assert_eq!(fx.client.request("hello").await, "hello");
}

#[tokio::test]
async fn begin_while_epoch_open_is_busy_and_cleans_up() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;

    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");

    // A concurrent begin is rejected; the failure-with-staged-path contract
    // aborts the open epoch so the session is armable again.
    let resp = fx.client.request(&fx.shot_path.clone()).await;
    assert!(resp.starts_with("error"), "unexpected response: {resp}");
    assert!(resp.contains("busy"));
    assert!(!fx.bench.is_armed());

    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
}

#[tokio::test]
async fn done_without_open_epoch_is_a_protocol_error() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;
    let resp = fx.client.request("done").await;
    assert!(resp.starts_with("error"), "unexpected response: {resp}");
}

#[tokio::test]
async fn disabled_camera_completes_without_arming_or_persisting() {
    let shot = r#"
        [cameras.OTHER_CAM]
        exposure_us = 100
        trigger = "auto"
        exposures = ["t0"]
    "#;
    let mut fx = fixture(shot, Duration::from_millis(200)).await;

    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
    assert_eq!(fx.bench.arm_calls(), 0);

    assert_eq!(fx.client.staged_request("done").await, "done");
    assert!(fx.store.epochs().is_empty());

    drop(fx.client);
    let endpoint = fx.server.await.unwrap();
    assert_eq!(endpoint.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn missing_shot_file_reports_error_and_recovers() {
    let mut fx = fixture(&two_exposure_shot(), Duration::from_millis(200)).await;

    let bogus: String = PathBuf::from("/nonexistent/run_999.toml")
        .to_str()
        .unwrap()
        .to_string();
    let resp = fx.client.staged_request(&bogus).await;
    assert!(resp.starts_with("error"), "unexpected response: {resp}");

    // The staged path was cleared and the session is usable.
    assert_eq!(fx.client.staged_request(&fx.shot_path.clone()).await, "done");
}
