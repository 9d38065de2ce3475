use std::fmt;
use std::io;

use pairlink_session::{ChannelError, ExchangeError, LinkError};
use pairlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PEER_REJECTED: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::NotReachable | LinkError::Disconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        LinkError::Json(_) | LinkError::Protocol(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn exchange_error(context: &str, err: ExchangeError) -> CliError {
    match err {
        ExchangeError::PeerUnreachable => CliError::new(FAILURE, format!("{context}: {err}")),
        ExchangeError::Transport(err) => link_error(context, err),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Spawn(source) => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exchange_errors_map_to_exit_codes() {
        assert_eq!(
            exchange_error("send", ExchangeError::PeerUnreachable).code,
            FAILURE
        );
        assert_eq!(
            exchange_error(
                "send",
                ExchangeError::Transport(LinkError::Timeout(Duration::from_secs(1)))
            )
            .code,
            TIMEOUT
        );
        assert_eq!(
            exchange_error(
                "send",
                ExchangeError::Transport(LinkError::Protocol("bad".into()))
            )
            .code,
            DATA_INVALID
        );
    }

    #[test]
    fn message_keeps_context() {
        let err = link_error("connect failed", LinkError::NotReachable);
        assert_eq!(err.to_string(), "connect failed: peer not reachable");
    }
}
