use std::time::Duration;

use crate::reply::Reply;

/// Failures reported by a [`crate::PairedSession`] transport.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The transport has no reachable peer right now.
    #[error("peer not reachable")]
    NotReachable,

    /// No reply arrived within the send timeout.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The connection dropped.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Session hello failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer sent something that is not part of the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Opaque platform failure.
    #[error("transport failure: {0}")]
    Failed(String),

    #[error("frame error: {0}")]
    Frame(#[from] pairlink_frame::FrameError),

    #[error("stream error: {0}")]
    Transport(#[from] pairlink_transport::TransportError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Why a send did not produce a reply.
///
/// A payload the peer could not decode is not an error here: it comes back
/// as a [`Reply`] whose status is `error`.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The session was not `ActivatedReachable`; nothing was sent.
    #[error("peer not connected or not reachable")]
    PeerUnreachable,

    /// The transport failed during the exchange.
    #[error("transport error: {0}")]
    Transport(LinkError),
}

impl From<LinkError> for ExchangeError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NotReachable => ExchangeError::PeerUnreachable,
            other => ExchangeError::Transport(other),
        }
    }
}

/// Outcome of a single send attempt.
pub type ExchangeResult = std::result::Result<Reply, ExchangeError>;

/// Failures opening a [`crate::PeerChannel`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Another open channel in this process already uses the name.
    #[error("a channel named '{0}' is already open in this process")]
    AlreadyOpen(String),

    /// The event loop or notification thread could not be started.
    #[error("failed to start channel thread: {0}")]
    Spawn(std::io::Error),
}
