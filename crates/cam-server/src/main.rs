//! Process bootstrap: one acquisition endpoint per configured camera.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cam_core::CameraLink;
use cam_server::{serve_endpoint, CameraEndpoint, RawDirStore, ServerConfig, TomlManifestSource};
use cam_session::CameraSession;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cam-server", about = "Triggered camera acquisition server")]
struct Cli {
    /// Path to the server configuration file.
    #[arg(short, long, default_value = "cam-server.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let store = Arc::new(RawDirStore::new(&config.data_dir));
    let manifest_source = Arc::new(TomlManifestSource::new());

    let mut cancel_handles = Vec::new();
    let mut links: Vec<Arc<dyn CameraLink>> = Vec::new();
    for entry in &config.cameras {
        // The in-tree binding is the simulated pco.edge; a vendor SDK
        // build would select its link here instead.
        let (link, bench) = cam_driver_pco::PcoEdgeLink::simulated();
        link.open().await?;
        links.push(link.clone());

        if let Some(hz) = entry.sim_trigger_hz {
            let period = Duration::from_secs_f64(1.0 / hz.max(f64::MIN_POSITIVE));
            let bench = bench.clone();
            let camera = entry.name.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    if bench.is_armed() {
                        bench.fire();
                    } else {
                        tracing::trace!(camera = %camera, "sim trigger idle: camera not armed");
                    }
                }
            });
            info!(camera = %entry.name, hz, "simulated trigger source running");
        }

        let session = CameraSession::new(
            entry.name.clone(),
            link,
            entry.buffer_count,
            entry.collect_timing(),
        );
        cancel_handles.push(session.cancel_handle());

        let endpoint = CameraEndpoint::new(
            session,
            manifest_source.clone(),
            store.clone(),
            entry.manifest_extension.clone(),
        );
        let listener = TcpListener::bind(entry.listen)
            .await
            .with_context(|| format!("binding {} for {}", entry.listen, entry.name))?;
        info!(camera = %entry.name, listen = %entry.listen, "starting camera endpoint");
        tokio::spawn(async move {
            if let Err(e) = serve_endpoint(endpoint, listener).await {
                warn!(error = %e, "camera endpoint exited");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested; cancelling open collections");
    for handle in &cancel_handles {
        handle.cancel();
    }
    for link in &links {
        if let Err(e) = link.close().await {
            warn!(error = %e, "camera close failed during shutdown");
        }
    }
    Ok(())
}
