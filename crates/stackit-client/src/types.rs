//! Request and response types for the StackIt API.
//!
//! These types mirror the server's API contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

/// What a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone answered one of the user's questions.
    Answer,
    /// Someone commented on one of the user's posts.
    Comment,
    /// The user was mentioned with `@username`.
    Mention,
}

/// A single notification as returned by `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification ID (unique per server).
    pub id: i64,
    /// Human readable text.
    pub message: String,
    /// Whether the user has seen it.
    #[serde(default)]
    pub is_read: bool,
    /// Creation time. Naive server timestamps are read as UTC.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Owner of the notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Notification category.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationKind>,
    /// ID of the post or comment the notification points to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<i64>,
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListNotificationsQuery {
    /// Number of notifications to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// Maximum number of notifications to return (server caps at 100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Response from `POST /notifications/read_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Operation status, `"success"` when the server applied it.
    pub status: String,
}

/// Timestamps with or without a UTC offset.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_notification_from_server_json() {
        let json = r#"{
            "id": 7,
            "user_id": 3,
            "message": "alice answered your question",
            "type": "answer",
            "reference_id": 42,
            "is_read": false,
            "created_at": "2024-05-01T10:20:30.123456"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, 7);
        assert_eq!(n.kind, Some(NotificationKind::Answer));
        assert_eq!(n.reference_id, Some(42));
        assert!(!n.is_read);
        assert_eq!(
            n.created_at.timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap().timestamp()
        );
    }

    #[test]
    fn test_notification_with_offset_timestamp() {
        let json = r#"{"id":1,"message":"m","is_read":true,"created_at":"2024-05-01T12:00:00+02:00"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert!(n.is_read);
        assert!(n.kind.is_none());
        assert_eq!(n.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let json = r#"{"id":1,"message":"m","created_at":"yesterday"}"#;
        assert!(serde_json::from_str::<Notification>(json).is_err());
    }

    #[test]
    fn test_list_query_skips_unset_fields() {
        let query = ListNotificationsQuery {
            skip: None,
            limit: Some(20),
        };
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#"{"limit":20}"#);
    }
}
