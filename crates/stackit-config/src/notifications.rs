//! Tunables for the push connection and the notification cache.
//!
//! ```yaml
//! notifications:
//!   retry-delay-secs: 5
//!   max-retry-delay-secs: 60
//!   stale-time-secs: 300
//!   connect-timeout-secs: 10
//!   alerts: ask
//!   alert-title: StackIt
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default delay before reconnecting after an abnormal close.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Default staleness window for the cached notification list.
pub const DEFAULT_STALE_TIME_SECS: u64 = 300;

/// Default alert title.
pub const DEFAULT_ALERT_TITLE: &str = "StackIt";

/// Whether incoming push events raise a user-facing alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertMode {
    /// Undecided; the host asks once at startup.
    #[default]
    Ask,
    /// Always show alerts.
    Always,
    /// Never show alerts.
    Never,
}

/// Notification settings shared by all contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotificationSettings {
    /// Seconds to wait before reconnecting.
    pub retry_delay_secs: u64,

    /// Upper bound for exponential backoff. `None` keeps the delay fixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_delay_secs: Option<u64>,

    /// Seconds before a fetched notification list is considered stale.
    pub stale_time_secs: u64,

    /// Seconds allowed for the WebSocket handshake. `None` relies on the
    /// transport's own failure reporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Alert behavior.
    pub alerts: AlertMode,

    /// Title used for alerts.
    pub alert_title: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_retry_delay_secs: None,
            stale_time_secs: DEFAULT_STALE_TIME_SECS,
            connect_timeout_secs: None,
            alerts: AlertMode::Ask,
            alert_title: DEFAULT_ALERT_TITLE.to_string(),
        }
    }
}

impl NotificationSettings {
    /// Reject settings that would busy-loop or never back off.
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "notifications.retry-delay-secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(max) = self.max_retry_delay_secs
            && max < self.retry_delay_secs
        {
            return Err(ConfigError::Invalid {
                field: "notifications.max-retry-delay-secs".to_string(),
                reason: format!("must be >= retry-delay-secs ({})", self.retry_delay_secs),
            });
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn max_retry_delay(&self) -> Option<Duration> {
        self.max_retry_delay_secs.map(Duration::from_secs)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}
