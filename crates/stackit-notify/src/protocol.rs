//! Push wire format.
//!
//! Every text frame on the push channel is a JSON object:
//!
//! ```json
//! {"msg": "alice answered your question", "unread_count": 3}
//! ```
//!
//! Unknown fields are ignored. Missing or mistyped fields make the frame
//! malformed.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Close code for an intentional close, by either side.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code the server sends when it rejects the credential.
pub const CLOSE_CREDENTIAL_REJECTED: u16 = 4001;

/// Reported locally when the peer closed without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Reported locally when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// A server push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Human-readable notification text.
    #[serde(rename = "msg")]
    pub message: String,

    /// The user's authoritative unread total at send time.
    pub unread_count: u64,
}

impl PushEvent {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Whether a close code means "stop, don't come back".
pub fn is_intentional_close(code: u16) -> bool {
    code == CLOSE_NORMAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let event = PushEvent::decode(r#"{"msg":"New answer","unread_count":3}"#).unwrap();
        assert_eq!(event.message, "New answer");
        assert_eq!(event.unread_count, 3);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let event =
            PushEvent::decode(r#"{"msg":"hi","unread_count":0,"type":"mention"}"#).unwrap();
        assert_eq!(event.unread_count, 0);
    }

    #[test]
    fn test_message_field_name_is_not_accepted() {
        // The text travels under "msg"; a "message" key alone is malformed.
        let result = PushEvent::decode(r#"{"message":"New answer","unread_count":3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_frames() {
        assert!(PushEvent::decode("not json").is_err());
        assert!(PushEvent::decode(r#"{"msg":"x"}"#).is_err());
        assert!(PushEvent::decode(r#"{"msg":"x","unread_count":-1}"#).is_err());
        assert!(PushEvent::decode(r#"{"msg":"x","unread_count":"3"}"#).is_err());
        assert!(PushEvent::decode("[]").is_err());
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let event = PushEvent {
            message: "hello".to_string(),
            unread_count: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["msg"], "hello");
        assert_eq!(json["unread_count"], 1);
    }

    #[test]
    fn test_intentional_close() {
        assert!(is_intentional_close(CLOSE_NORMAL));
        assert!(!is_intentional_close(CLOSE_CREDENTIAL_REJECTED));
        assert!(!is_intentional_close(CLOSE_ABNORMAL));
        assert!(!is_intentional_close(1011));
    }
}
