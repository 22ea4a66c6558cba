//! wPanel Realtime - Binary Entry Point
//!
//! `wpanel-realtime serve` runs the hub, `wpanel-realtime listen` connects a
//! client that logs every invalidation and notification.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wpanel_realtime::api::spawn_hub;
use wpanel_realtime::{
    CacheInvalidator, CacheTarget, ChannelConfig, HubConfig, Notification, Notifier,
    RealtimeChannel,
};

/// Logs invalidations instead of refetching
struct LogInvalidator;

impl CacheInvalidator for LogInvalidator {
    fn invalidate(&self, target: &CacheTarget) {
        info!(cache_key = %target, "cache invalidated");
    }
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: &Notification) {
        info!(
            title = %notification.title,
            body = %notification.body,
            variant = ?notification.variant,
            "notification"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());
    match mode.as_str() {
        "serve" => serve().await,
        "listen" => listen().await,
        other => bail!("unknown mode {other:?}, expected `serve` or `listen`"),
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = HubConfig::from_env().context("invalid hub configuration")?;
    let hub = spawn_hub(&config).await?;

    shutdown_signal().await;
    hub.shutdown().await
}

async fn listen() -> anyhow::Result<()> {
    let config = ChannelConfig::from_env().context("invalid channel configuration")?;
    let channel = RealtimeChannel::websocket(config, Arc::new(LogInvalidator), Arc::new(LogNotifier));

    let mut states = channel.subscribe_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!(state = %state, "connection state");
        }
    });

    channel.connect();
    shutdown_signal().await;
    channel.disconnect();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
