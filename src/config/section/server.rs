//! `[server]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! interface = "127.0.0.1"       # Network interface (127.0.0.1 = localhost only)
//! port = 3449                   # WebSocket port
//! debounce_ms = 10              # Wait before forwarding a change to clients
//! http_server_root = "public"   # Directory under each resource path served at `/`
//! ws_path = "/figwheel-ws"      # Path clients connect to
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reload::ChannelOptions;

/// Notification server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    pub port: u16,

    /// Delay before a log append is forwarded, coalescing bursts.
    pub debounce_ms: u64,

    pub http_server_root: String,

    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3449,
            debounce_ms: 10,
            http_server_root: "public".to_string(),
            ws_path: "/figwheel-ws".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            ..ChannelOptions::default()
        }
    }
}
