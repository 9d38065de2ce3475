//! Reply mapping returned for every received message.

use serde_json::Value;

use crate::error::LinkError;
use crate::payload::TransportMap;

pub const STATUS_KEY: &str = "status";
pub const MESSAGE_KEY: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Error,
}

impl ReplyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplyStatus::Success => "success",
            ReplyStatus::Error => "error",
        }
    }
}

/// `{status, message}`. The message is for humans and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub message: String,
}

impl Reply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: message.into(),
        }
    }

    /// Reply sent after a color was applied.
    pub fn color_updated() -> Self {
        Self::success("color updated")
    }

    /// Reply sent for a message that did not decode as a color.
    pub fn invalid_color(reason: impl std::fmt::Display) -> Self {
        Self::error(format!("invalid color data: {reason}"))
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    pub fn to_map(&self) -> TransportMap {
        let mut map = TransportMap::new();
        map.insert(STATUS_KEY.to_string(), Value::from(self.status.as_str()));
        map.insert(MESSAGE_KEY.to_string(), Value::from(self.message.as_str()));
        map
    }

    /// Parse a reply. A missing or unknown status is a protocol violation;
    /// a missing message reads as empty.
    pub fn from_map(map: &TransportMap) -> Result<Self, LinkError> {
        let status = match map.get(STATUS_KEY).and_then(Value::as_str) {
            Some("success") => ReplyStatus::Success,
            Some("error") => ReplyStatus::Error,
            Some(other) => {
                return Err(LinkError::Protocol(format!(
                    "unknown reply status '{other}'"
                )))
            }
            None => return Err(LinkError::Protocol("reply has no status".to_string())),
        };
        let message = map
            .get(MESSAGE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self { status, message })
    }
}
