mod api;
mod capture;
mod config;
mod discovery;
mod dns;
mod error;
mod lister;
mod state_manager;
#[cfg(test)]
mod testutil;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::capture::MdnsCapture;
use crate::config::Config;
use crate::discovery::state::DiscoveryState;
use crate::state_manager::StateHandle;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sd_observerd=info"))
        )
        .init();

    tracing::info!("Starting sd-observerd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/sd-observer/observerd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Nothing to observe without the capture, so this is fatal
    let capture = MdnsCapture::open(&config.capture)
        .context("Failed to open mDNS capture")?;

    // Build the discovery state
    let mut state = DiscoveryState::new(config.discovery.deferred_limit);
    if config.discovery.seed_local_host {
        match discovery::local::local_host() {
            Ok(host) => {
                tracing::info!("Seeding local host {}", host.name);
                state.seed_host(host);
            }
            Err(e) => tracing::warn!("Could not determine local host: {:#}", e),
        }
    }

    // Start state thread
    let (hash_tx, hash_rx) = watch::channel(String::new());
    let state_handle = StateHandle::spawn(state, hash_tx);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn service lister poller into its own slot
    let (listing_tx, listing_rx) = watch::channel(Vec::new());
    let (type_names_tx, type_names_rx) = watch::channel(Vec::new());
    let lister_handle = if config.lister.enabled {
        let lister_cancel = cancel.clone();
        let lister_config = config.lister.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = lister::run_poller(lister_config, listing_tx, type_names_tx, lister_cancel).await {
                tracing::error!("Service lister error: {}", e);
            }
        }))
    } else {
        None
    };

    // Spawn packet consumer task
    let (packet_tx, packet_rx) = mpsc::channel(config.capture.channel_capacity.max(1));
    let consumer_cancel = cancel.clone();
    let consumer_state = state_handle.clone();
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = state_manager::run(consumer_state, packet_rx, consumer_cancel).await {
            tracing::error!("Packet consumer error: {}", e);
        }
    });

    // Spawn capture task
    let capture_cancel = cancel.clone();
    let capture_handle = tokio::spawn(async move {
        if let Err(e) = capture.run(packet_tx, capture_cancel).await {
            tracing::error!("mDNS capture error: {}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        state: state_handle.clone(),
        hash_rx,
        listing_rx,
        type_names_rx,
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(capture_handle, consumer_handle, server_handle);
    if let Some(handle) = lister_handle {
        let _ = handle.await;
    }

    // Shutdown state thread
    if let Err(e) = state_handle.shutdown().await {
        tracing::error!("Failed to shutdown state thread: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
