mod config;
mod mdns;
mod static_services;
mod tracker;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use anyhow::{bail, Context, Result};
use ad_listeners::{event_channels, ActiveListeners, ListenerRegistry};
use crate::config::Config;
use crate::tracker::ServiceTracker;

/// Make every backend this binary knows about available by name.
fn register_backends(registry: &ListenerRegistry, config: &Config) {
    mdns::register(registry, &config.mdns);
    static_services::register(registry, &config.static_services);
}

/// Wait for the tracker task. A panic is logged and yields `None`.
async fn join_tracker(handle: JoinHandle<ServiceTracker>) -> Option<ServiceTracker> {
    match handle.await {
        Ok(tracker) => Some(tracker),
        Err(e) => {
            tracing::error!("Service tracker task failed: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("discoveryd=info,ad_listeners=info"))
        )
        .init();

    tracing::info!("Starting discoveryd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/discoveryd/discoveryd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let registry = ListenerRegistry::new();
    register_backends(&registry, &config);
    tracing::info!("Available service listeners: {:?}", registry.names());

    let (senders, events) = event_channels(config.discovery.channel_capacity);

    // Spawn the consumer before any listener can fill the channels
    let cancel = CancellationToken::new();
    let tracker_cancel = cancel.clone();
    let summary_interval = Duration::from_secs(config.discovery.summary_interval_secs);
    let tracker_handle = tokio::spawn(async move {
        tracker::run(ServiceTracker::new(), events, summary_interval, tracker_cancel).await
    });

    let active = ActiveListeners::start(&registry, &config.discovery.listeners, &senders);
    drop(senders);

    if active.is_empty() {
        cancel.cancel();
        join_tracker(tracker_handle).await;
        bail!(
            "No service listener could be started ({} failed)",
            active.failures().len()
        );
    }

    tracing::info!("Discovery running with listeners {:?}", active.names());

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    for (name, e) in active.stop_all().await {
        tracing::error!("Service listener {} did not stop cleanly: {}", name, e);
    }

    // Listeners are gone; let the tracker drain what they sent
    match tokio::time::timeout(Duration::from_secs(5), join_tracker(tracker_handle)).await {
        Ok(Some(tracker)) => {
            tracing::info!("{} services were live at shutdown", tracker.len());
        }
        Ok(None) => {}
        Err(_) => {
            tracing::warn!("Service tracker did not drain in time");
            cancel.cancel();
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
