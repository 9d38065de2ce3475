//! Paired-peer session channel.
//!
//! A [`PeerChannel`] sits on one end of a two-device link. It tracks the
//! session lifecycle reported by a [`PairedSession`] transport, sends
//! [`ColorPayload`]s to the peer with single-shot request/reply semantics,
//! answers the peer's messages, and projects everything into an
//! [`ObservableUiState`] that UI code reads or observes.
//!
//! Two transports ship with the crate: [`LoopbackSession`] for in-process
//! pairs, and [`SocketSession`] over Unix domain sockets.

pub mod channel;
pub mod error;
pub mod exchange;
#[cfg(unix)]
pub mod link;
pub mod loopback;
pub mod payload;
pub mod reactivation;
pub mod reply;
pub mod session;
pub mod sink;
pub mod state;

pub use channel::{ChannelBuilder, ChannelConfig, PeerChannel};
pub use error::{ChannelError, ExchangeError, ExchangeResult, LinkError, Result};
pub use exchange::Exchange;
#[cfg(unix)]
pub use link::{LinkConfig, LinkRole, SocketSession};
pub use loopback::LoopbackSession;
pub use payload::{decode, encode, ColorPayload, MalformedPayload, TransportMap};
pub use reactivation::ReactivationPolicy;
pub use reply::{Reply, ReplyStatus};
pub use session::{IncomingMessage, PairedSession, Responder, SessionDelegate, SessionEvent};
pub use sink::{ObservableUiState, StateSink};
pub use state::{SessionState, SessionStateMachine, Transition};
