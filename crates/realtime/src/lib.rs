//! WebSocket transport for the Planboard collaboration channel.
//!
//! Provides the socket client, exponential-backoff reconnection, and the
//! [`ConnectionManager`] that owns the connection lifecycle and implements
//! [`Channel`](planboard_events::Channel) for production use.

pub mod client;
pub mod manager;
pub mod reconnect;

pub use client::{RealtimeClient, RealtimeClientError, RealtimeConnection};
pub use manager::ConnectionManager;
pub use reconnect::ReconnectConfig;

/// The production [`Channel`](planboard_events::Channel) implementation.
pub type SocketChannel = ConnectionManager;
