//! Data types for the realtime channel
//!
//! This module contains the wire messages, the connection state and the
//! side effects produced by dispatch.

mod message;
mod notification;
mod state;

pub use message::{
    split_mutation_type, ClientMessage, EntityKind, MessageKind, MutationAction, RealtimeMessage,
};
pub use notification::{CacheTarget, Notification, NotificationVariant};
pub use state::ConnectionState;
