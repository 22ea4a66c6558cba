//! Realtime channel client
//!
//! Keeps one WebSocket open to the hub and turns pushed mutation events into
//! cache invalidations and toasts.
//!
//! ## Features
//! - Auto-reconnect with fixed delays (3s after a drop, 5s after a failed open)
//! - Keep-alive `ping` every 30s while connected
//! - Activity flag raised for 2s after each non-keepalive message
//! - Injected cache-invalidation and notification collaborators

pub mod client;
pub mod dispatch;
pub mod transport;
mod timer;

pub use client::RealtimeChannel;
pub use dispatch::{dispatch, CacheInvalidator, DispatchOutcome, Notifier};
pub use transport::{Connection, SocketEvent, Transport, WebSocketTransport};
