//! wPanel Realtime
//!
//! The realtime notification and cache-invalidation channel of the wPanel
//! dashboard: a reconnecting WebSocket client plus the hub it talks to.
//!
//! # Features
//!
//! - **Auto-Reconnect**: fixed-delay reconnect, retried until disconnected
//! - **Keep-Alive**: periodic `ping` while connected
//! - **Dispatch Tables**: mutation events mapped to cache targets and toasts
//! - **Injected Collaborators**: no global query cache, easy to test
//! - **Hub**: axum `/ws` endpoint with `POST /api/events` publishing
//!
//! # Modules
//!
//! - `types`: Wire messages, connection state, notifications
//! - `realtime`: Channel client, dispatch tables and transport
//! - `api`: Realtime hub (WebSocket + REST)
//! - `config`: Environment-driven configuration
//! - `error`: Error types
//! - `utils`: Utility functions (timestamps)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wpanel_realtime::{CacheInvalidator, CacheTarget, ChannelConfig, Notification, Notifier, RealtimeChannel};
//!
//! struct QueryCache;
//! impl CacheInvalidator for QueryCache {
//!     fn invalidate(&self, target: &CacheTarget) {
//!         println!("refetch {target}");
//!     }
//! }
//!
//! struct Toasts;
//! impl Notifier for Toasts {
//!     fn show(&self, notification: &Notification) {
//!         println!("{}: {}", notification.title, notification.body);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ChannelConfig::from_env()?;
//!     let channel = RealtimeChannel::websocket(config, Arc::new(QueryCache), Arc::new(Toasts));
//!     channel.connect();
//!     tokio::signal::ctrl_c().await?;
//!     channel.disconnect();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod realtime;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{endpoint_from_origin, ChannelConfig, HubConfig};
pub use error::{ChannelError, ChannelResult, ConfigError};
pub use realtime::{
    CacheInvalidator, DispatchOutcome, Notifier, RealtimeChannel, SocketEvent, Transport,
    WebSocketTransport,
};
pub use types::{
    CacheTarget, ConnectionState, MessageKind, Notification, NotificationVariant, RealtimeMessage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
