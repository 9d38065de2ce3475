//! Byte-stream transport for pairlink.
//!
//! The socket link in `pairlink-session` runs on top of the connected
//! [`LinkStream`] handed out here. Only Unix domain sockets are provided;
//! radio transports are out of scope and plug in at the session boundary
//! instead.

pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::LinkStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
