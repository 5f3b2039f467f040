//! Command dispatcher: maps protocol requests onto session transitions.
//!
//! The wire contract is line-based request/response with a single request
//! in flight per camera:
//!
//! | request | precondition | action | response |
//! |---|---|---|---|
//! | `hello` | any | none | `hello` |
//! | `<path>.<ext>` | `Idle` | stage, ack, await peer ack, `begin` | `ok` then `done` |
//! | `done` | `Buffered` | ack, await peer ack, `finish` + persist | `ok` then `done` |
//! | `abort` | any | `abort` | `ok` |
//! | anything else | — | none | `error …` |
//!
//! The two-phase `ok`/ack handshake lets the peer sequence its own
//! bookkeeping between accepting the request and the (potentially slow)
//! transition.
//!
//! Guaranteed cleanup: if anything fails while a shot path is staged and
//! the request is not `abort`, the dispatcher issues an internal `abort`
//! and clears the staged path before reporting the error to the peer, so
//! the session is always left armable for the next epoch.

use std::path::PathBuf;
use std::sync::Arc;

use cam_core::{CamError, CamResult, EpochStatus, FrameStore, ManifestSource};
use cam_session::{CameraSession, SessionState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Protocol endpoint for one camera.
pub struct CameraEndpoint {
    session: CameraSession,
    manifest_source: Arc<dyn ManifestSource>,
    store: Arc<dyn FrameStore>,
    /// Shot-file extension this endpoint recognizes as a `begin` request.
    manifest_extension: String,
    staged: Option<PathBuf>,
}

impl CameraEndpoint {
    pub fn new(
        session: CameraSession,
        manifest_source: Arc<dyn ManifestSource>,
        store: Arc<dyn FrameStore>,
        manifest_extension: impl Into<String>,
    ) -> Self {
        Self {
            session,
            manifest_source,
            store,
            manifest_extension: manifest_extension.into(),
            staged: None,
        }
    }

    pub fn session(&self) -> &CameraSession {
        &self.session
    }

    /// Serve one peer connection until it closes.
    ///
    /// Errors in request handling are reported to the peer as
    /// `error <message>` lines and do not end the connection; only I/O
    /// failures do.
    pub async fn serve<S>(&mut self, stream: S) -> CamResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half).lines();

        while let Some(line) = reader.next_line().await? {
            let request = line.trim().to_string();
            if request.is_empty() {
                continue;
            }
            info!(camera = self.session.name(), request = %request, "request received");

            match self.handle_request(&request, &mut reader, &mut writer).await {
                Ok(()) => {}
                Err(e) => {
                    // Guaranteed cleanup contract: a failure with a shot
                    // staged (and not caused by an abort request) must
                    // leave the session idle and the staging cleared.
                    if self.staged.is_some() && request != "abort" {
                        warn!(
                            camera = self.session.name(),
                            error = %e,
                            "request failed with a shot staged; aborting epoch"
                        );
                        self.session.abort().await;
                    }
                    self.staged = None;
                    write_line(&mut writer, &format!("error {e}")).await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_request<R, W>(
        &mut self,
        request: &str,
        reader: &mut tokio::io::Lines<R>,
        writer: &mut W,
    ) -> CamResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if request == "hello" {
            return write_line(writer, "hello").await;
        }

        if request == "abort" {
            self.session.abort().await;
            self.staged = None;
            return write_line(writer, "ok").await;
        }

        if request == "done" {
            if self.session.state() != SessionState::Buffered {
                return Err(CamError::protocol(format!(
                    "done while {}",
                    self.session.state().as_str()
                )));
            }
            write_line(writer, "ok").await?;
            await_peer_ack(reader).await?;

            let result = self.session.finish().await?;
            let shot = self
                .staged
                .clone()
                .ok_or_else(|| CamError::protocol("no shot staged for done"))?;

            match result.status {
                // Aborted epochs were discarded; disabled cameras took no
                // part in the shot. Neither reaches the store.
                EpochStatus::Aborted | EpochStatus::Disabled => {}
                EpochStatus::Complete | EpochStatus::Partial => {
                    self.store
                        .persist(self.session.name(), &shot, &result.frames)
                        .await?;
                }
            }
            if self.session.state() == SessionState::Static {
                self.session.settle()?;
            }
            self.staged = None;
            return write_line(writer, "done").await;
        }

        if self.is_shot_path(request) {
            if self.session.state() != SessionState::Idle {
                return Err(CamError::Busy);
            }
            let path = PathBuf::from(request);
            self.staged = Some(path.clone());
            write_line(writer, "ok").await?;
            await_peer_ack(reader).await?;

            let manifest = self
                .manifest_source
                .load(self.session.name(), &path)
                .await?;
            self.session.begin(manifest).await?;
            return write_line(writer, "done").await;
        }

        Err(CamError::protocol(format!("invalid request: {request}")))
    }

    fn is_shot_path(&self, request: &str) -> bool {
        std::path::Path::new(request)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.manifest_extension)
    }
}

/// The peer acknowledges an `ok` with one more line (content ignored, as
/// in the original handshake). A closed connection here is an error: the
/// transition must not run without the ack.
async fn await_peer_ack<R>(reader: &mut tokio::io::Lines<R>) -> CamResult<()>
where
    R: AsyncBufRead + Unpin,
{
    match reader.next_line().await? {
        Some(_) => Ok(()),
        None => Err(CamError::protocol("peer closed before acknowledging")),
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> CamResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Accept loop for one camera endpoint.
///
/// Connections are served one at a time: a single request in flight per
/// camera is a protocol guarantee, not an implementation accident.
pub async fn serve_endpoint(mut endpoint: CameraEndpoint, listener: TcpListener) -> CamResult<()> {
    info!(
        camera = endpoint.session.name(),
        addr = %listener.local_addr()?,
        "camera endpoint listening"
    );
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(camera = endpoint.session.name(), peer = %peer, "peer connected");
        if let Err(e) = endpoint.serve(stream).await {
            warn!(camera = endpoint.session.name(), error = %e, "connection ended with error");
        }
    }
}
