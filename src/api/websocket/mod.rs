//! WebSocket endpoint of the realtime hub
//!
//! Provides `/ws`, which greets each client with a `connection` message,
//! answers `ping` with `pong` and fans out every published mutation event.

pub mod handler;
pub mod state;

pub use handler::ws_handler;
pub use state::HubState;
