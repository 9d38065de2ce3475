use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (4) + kind (2) + correlation id (4).
pub const HEADER_SIZE: usize = 12;

/// Magic bytes: "PL" (0x50 0x4C).
pub const MAGIC: [u8; 2] = [0x50, 0x4C];

/// Default maximum payload size: 1 MiB. Session maps are tiny; this only
/// bounds what a misbehaving peer can make us buffer.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind, see [`crate::kind`].
    pub kind: u16,
    /// Correlation id. Replies echo the id of the message they answer.
    pub id: u32,
    /// Frame body.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u16, id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            id,
            payload: payload.into(),
        }
    }

    /// Header plus payload length on the wire.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Append one encoded frame to `dst`.
///
/// ```text
/// ┌────────────┬───────────┬──────────┬──────────┬──────────────┐
/// │ Magic (2B) │ Length    │ Kind     │ Id       │ Payload      │
/// │ "PL"       │ (4B LE)   │ (2B LE)  │ (4B LE)  │ (Length B)   │
/// └────────────┴───────────┴──────────┴──────────┴──────────────┘
/// ```
pub fn encode_frame(kind: u16, id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_u16_le(kind);
    dst.put_u32_le(id);
    dst.put_slice(payload);
    Ok(())
}

/// Take one complete frame off the front of `src`.
///
/// Returns `Ok(None)` while the buffer holds less than a whole frame; the
/// buffer is only consumed once a frame is complete.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    if src[..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let kind = header.get_u16_le();
    let id = header.get_u32_le();

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(Frame { kind, id, payload }))
}

/// Limits and timeouts shared by [`crate::FrameReader`] and [`crate::FrameWriter`].
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes.
    pub max_payload_size: usize,
    /// Read timeout applied to the underlying stream.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the underlying stream.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
