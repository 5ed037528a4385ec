//! Synchronization module for the collaborative shop editor.
//!
//! This module implements the client side of the row-locking protocol.
//! It provides:
//! - JSON text-frame protocol codec over WebSocket
//! - Connection management with automatic reconnection
//! - Lock state tracking driven by inbound server events

pub mod connection;
pub mod locks;
pub mod protocol;

pub use connection::{ChannelConfig, Connection, ConnectionState};
pub use locks::{LockHolder, LockTable, RowLock};

use std::time::Duration;

/// Unique identifier for a shop row (server-assigned)
pub type ShopId = i64;

/// Unique identifier for a user
pub type UserId = String;

/// Delay between reconnection attempts. Fixed, no backoff, retried forever.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Identity of the local user as reported by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub username: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Derive the channel URL from the REST base URL when not configured
/// explicitly. Matches the scheme of the API origin: https maps to wss.
pub fn derive_channel_url(api_base: &str) -> String {
    let origin = api_base.trim_end_matches('/');
    let ws_origin = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", origin)
    };
    format!("{}/ws/shop-editor", ws_origin)
}
