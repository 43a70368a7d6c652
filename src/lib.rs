pub mod clock;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod mapper;
pub mod reporter;
pub mod store;
pub mod summary;
pub mod ticker;
pub mod types;

use std::time::Duration;

/// Volta live feed WebSocket endpoint (credentials go in the query string)
pub const DEFAULT_WS_URL: &str = "wss://novoga.sb21.net/ws";

/// Delay before reopening a channel that closed on its own
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Match clock refresh cadence
pub const CLOCK_TICK: Duration = Duration::from_secs(1);
