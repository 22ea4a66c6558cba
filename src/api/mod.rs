//! Realtime hub: the server half of the channel
//!
//! Serves the `/ws` endpoint clients connect to, plus a small REST surface
//! for publishing mutation events.

pub mod http;
pub mod rest;
pub mod websocket;

pub use http::{create_router, spawn_hub, HubHandle};
pub use websocket::HubState;
