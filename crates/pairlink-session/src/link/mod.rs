//! Paired session over a Unix domain socket.
//!
//! The display side listens, the picker side connects. Both exchange a
//! hello on the CONTROL frame kind before any message flows; a completed
//! hello is what activates the session. Dropped connections report the
//! peer unreachable until a new connection finishes its hello.

pub mod handshake;
pub mod socket;

use std::time::Duration;

use pairlink_frame::DEFAULT_MAX_PAYLOAD;

pub use handshake::{Hello, HelloOutcome};
pub use socket::SocketSession;

/// Which end of the socket this session owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Binds the socket and accepts one peer at a time.
    Listen,
    /// Connects to a listening peer, retrying until it is there.
    Connect,
}

/// Socket link settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Timeout for each blocking step of the hello.
    pub handshake_timeout: Duration,
    pub protocol_name: String,
    /// `<major>.<minor>`.
    pub protocol_version: String,
    /// Advertised to the peer as "companion app installed".
    pub app_installed: bool,
    pub max_payload_size: usize,
    pub write_timeout: Duration,
    /// How often the reader wakes up to check for shutdown.
    pub poll_interval: Duration,
    /// Pause between connection attempts on the connect side.
    pub reconnect_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            protocol_name: "pairlink".to_string(),
            protocol_version: "1.0".to_string(),
            app_installed: true,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            write_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            reconnect_interval: Duration::from_millis(200),
        }
    }
}

impl LinkConfig {
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_app_installed(mut self, installed: bool) -> Self {
        self.app_installed = installed;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}
