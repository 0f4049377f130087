//! Thought-Archive Server
//!
//! Composition root: builds the archive from the built-in embedder and
//! extractor, restores the last snapshot, and serves the HTTP API with a
//! periodic snapshot loop and a final snapshot on shutdown.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tracing::{error, info, warn};

use thought_archive::{
    accounting::TracingAccountant,
    archive::ThoughtArchive,
    config::{ArchiveConfig, ServerConfig},
    embeddings::HashingEmbedder,
    extraction::PatternExtractor,
    handlers::{self, AppState},
    runner::TokioTaskRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "thought_archive=info,tower_http=warn");
    }
    tracing_subscriber::fmt::init();

    let archive_config = ArchiveConfig::from_env();
    let server_config = ServerConfig::from_env();
    server_config.log(&archive_config);

    let dimension = archive_config.dimension;
    let archive: AppState = Arc::new(ThoughtArchive::new(
        archive_config,
        Arc::new(HashingEmbedder::new(dimension)),
        Some(Arc::new(PatternExtractor::new())),
        Arc::new(TokioTaskRunner::new()),
        Arc::new(TracingAccountant::new()),
    ));

    match archive.load_snapshot() {
        Ok(0) => info!("starting with an empty archive"),
        Ok(n) => info!("restored {n} thoughts"),
        // Index inconsistency on load is fatal: invariants cannot be
        // repaired at runtime
        Err(e) => {
            error!("snapshot restore failed: {e}");
            return Err(e.into());
        }
    }

    if server_config.snapshot_interval_secs > 0 {
        start_snapshot_scheduler(Arc::clone(&archive), server_config.snapshot_interval_secs);
    }

    let cors = server_config.cors.to_layer();
    let app = handlers::build_routes(Arc::clone(&archive)).layer(
        ServiceBuilder::new()
            .layer(tower::limit::ConcurrencyLimitLayer::new(
                server_config.max_concurrent_requests,
            ))
            .layer(cors),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], server_config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("thought-archive listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, writing final snapshot");
    if let Err(e) = archive.snapshot() {
        warn!("final snapshot failed: {e}");
    }

    Ok(())
}

fn start_snapshot_scheduler(archive: AppState, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup stays quiet
        interval.tick().await;

        loop {
            interval.tick().await;
            let swept = archive.sweep_expired();
            if swept > 0 {
                info!("maintenance: swept {swept} expired thoughts");
            }
            if let Err(e) = archive.snapshot() {
                warn!("periodic snapshot failed: {e}");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
