//! Length-prefixed framing for the pairlink socket link.
//!
//! Every frame carries:
//! - a 2-byte magic number ("PL") for stream synchronization
//! - a 4-byte little-endian payload length
//! - a 2-byte little-endian frame kind (control, message, reply)
//! - a 4-byte little-endian correlation id pairing a reply with its message

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use kind::{kind_name, CONTROL, MESSAGE, REPLY};
pub use reader::FrameReader;
pub use writer::FrameWriter;
