//! Messages pushed by the server over the async channel

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a server status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Login,
    Logout,
    LoginCount,
    /// Builder task status on the server (idle, building, ...)
    BuildStatus,
    /// Session idle warning before the server logs it out
    SoftTimeout,
    CommitNotify,
    AbortNotify,
    BadCredentials,
    Other(i32),
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Login => f.write_str("login"),
            MessageKind::Logout => f.write_str("logout"),
            MessageKind::LoginCount => f.write_str("login_count"),
            MessageKind::BuildStatus => f.write_str("build_status"),
            MessageKind::SoftTimeout => f.write_str("soft_timeout"),
            MessageKind::CommitNotify => f.write_str("commit_notify"),
            MessageKind::AbortNotify => f.write_str("abort_notify"),
            MessageKind::BadCredentials => f.write_str("bad_credentials"),
            MessageKind::Other(code) => write!(f, "other({})", code),
        }
    }
}

/// One server-push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AsyncMessage {
    /// The server is forcing this client off
    Shutdown { reason: String },
    /// Status text for display
    Message { kind: MessageKind, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let msg: AsyncMessage =
            serde_json::from_str(r#"{"type": "message", "kind": "build_status", "text": "idle"}"#)
                .unwrap();
        assert_eq!(
            msg,
            AsyncMessage::Message {
                kind: MessageKind::BuildStatus,
                text: "idle".to_string()
            }
        );

        let shutdown: AsyncMessage =
            serde_json::from_str(r#"{"type": "shutdown", "reason": "maintenance"}"#).unwrap();
        assert!(matches!(shutdown, AsyncMessage::Shutdown { reason } if reason == "maintenance"));
    }
}
