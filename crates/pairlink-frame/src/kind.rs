//! Frame kinds.

/// Session control (hello handshake).
pub const CONTROL: u16 = 0;

/// A message that expects exactly one reply.
pub const MESSAGE: u16 = 1;

/// The reply to a message, carrying the message's correlation id.
pub const REPLY: u16 = 2;

/// Human-readable name for a frame kind.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        CONTROL => "CONTROL",
        MESSAGE => "MESSAGE",
        REPLY => "REPLY",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_and_unknown_kinds() {
        assert_eq!(kind_name(MESSAGE), "MESSAGE");
        assert_eq!(kind_name(REPLY), "REPLY");
        assert_eq!(kind_name(CONTROL), "CONTROL");
        assert_eq!(kind_name(77), "UNKNOWN");
    }
}
