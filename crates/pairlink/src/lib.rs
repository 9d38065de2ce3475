//! Paired-peer color channel.
//!
//! pairlink links a color picker with a companion display: one end sends a
//! named RGBA color, the other shows it and answers once. The session layer
//! tracks whether the peer is activated and reachable and keeps a UI-ready
//! projection of all of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket streams
//! - [`frame`]: length-prefixed frames with correlation ids
//! - [`session`]: peer channel, session state machine, exchange, UI state
//!   (behind the `session` feature)
//! - [`palette`]: the built-in picker colors (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use pairlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pairlink_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use pairlink_session::*;
}

#[cfg(feature = "session")]
pub mod palette;
