//! AUDAC MTX Bridge
//!
//! Connects to one matrix unit, polls every zone and logs state changes.

use audac_mtx_bridge::adapters::{AudacClient, Startable, ZonePoller};
use audac_mtx_bridge::bus::{self, BusEvent};
use audac_mtx_bridge::config;

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audac_mtx_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting AUDAC MTX Bridge v{} ({})",
        env!("AUDAC_VERSION"),
        env!("AUDAC_GIT_SHA")
    );

    let config = config::load_config()?;
    tracing::info!(
        "Configuration loaded: {} ({} zones, poll every {:?})",
        config.matrix.addr(),
        config.matrix.zones,
        config.poll_interval()
    );

    let bus = bus::create_bus();
    let client = Arc::new(AudacClient::new(config.matrix.clone()));

    // A failed first connect is not fatal; polling reconnects lazily
    if let Err(e) = client.connect().await {
        tracing::warn!("Initial connection failed: {}", e);
    }

    let poller = ZonePoller::new(client.clone(), bus.clone(), config.poll_interval());
    let mut events = bus.subscribe();
    poller.start().await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutting down...");
    poller.stop().await;
    client.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn log_event(event: &BusEvent) {
    match event {
        BusEvent::MatrixConnected { host } => tracing::info!("Matrix {} online", host),
        BusEvent::MatrixDisconnected { host } => tracing::warn!("Matrix {} offline", host),
        BusEvent::ZoneStateChanged {
            zone,
            state,
            volume_percent,
        } => tracing::info!(
            "Zone {}: volume {}% ({} units), source {} ({}), mute {}, bass {}, treble {}",
            zone,
            volume_percent,
            state.volume,
            state.source,
            state.source_label().unwrap_or("none"),
            state.mute,
            state.bass,
            state.treble
        ),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
