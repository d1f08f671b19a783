//! User-facing alerts for push events.

use std::fmt;

use tracing::{debug, info};

use crate::Result;

/// Whether the host may show alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlertPermission {
    /// Not decided yet.
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for AlertPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertPermission::Default => write!(f, "default"),
            AlertPermission::Granted => write!(f, "granted"),
            AlertPermission::Denied => write!(f, "denied"),
        }
    }
}

/// An alert to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
}

/// Host alert facility.
pub trait Alerter: Send + Sync {
    /// Current permission state.
    fn permission(&self) -> AlertPermission;

    /// Ask the user. Only called while the state is `Default`.
    fn request_permission(&self) -> AlertPermission;

    /// Show an alert. Only called while permission is `Granted`.
    fn show(&self, alert: &Alert) -> Result<()>;
}

/// Ask for permission once if it has never been decided.
///
/// Returns the resulting permission.
pub fn ensure_permission(alerter: &dyn Alerter) -> AlertPermission {
    match alerter.permission() {
        AlertPermission::Default => {
            let decided = alerter.request_permission();
            info!(permission = %decided, "alert permission requested");
            decided
        }
        decided => {
            debug!(permission = %decided, "alert permission already decided");
            decided
        }
    }
}

/// Alerter for hosts with no alert facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlerts;

impl Alerter for NoAlerts {
    fn permission(&self) -> AlertPermission {
        AlertPermission::Denied
    }

    fn request_permission(&self) -> AlertPermission {
        AlertPermission::Denied
    }

    fn show(&self, _alert: &Alert) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Asking {
        state: Mutex<AlertPermission>,
        answer: AlertPermission,
        asked: Mutex<usize>,
    }

    impl Asking {
        fn new(state: AlertPermission, answer: AlertPermission) -> Self {
            Self {
                state: Mutex::new(state),
                answer,
                asked: Mutex::new(0),
            }
        }
    }

    impl Alerter for Asking {
        fn permission(&self) -> AlertPermission {
            *self.state.lock()
        }

        fn request_permission(&self) -> AlertPermission {
            *self.asked.lock() += 1;
            *self.state.lock() = self.answer;
            self.answer
        }

        fn show(&self, _alert: &Alert) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_asks_when_undecided() {
        let alerter = Asking::new(AlertPermission::Default, AlertPermission::Granted);
        assert_eq!(ensure_permission(&alerter), AlertPermission::Granted);
        assert_eq!(ensure_permission(&alerter), AlertPermission::Granted);
        assert_eq!(*alerter.asked.lock(), 1);
    }

    #[test]
    fn test_never_asks_when_decided() {
        let alerter = Asking::new(AlertPermission::Denied, AlertPermission::Granted);
        assert_eq!(ensure_permission(&alerter), AlertPermission::Denied);
        assert_eq!(*alerter.asked.lock(), 0);
    }

    #[test]
    fn test_no_alerts() {
        assert_eq!(ensure_permission(&NoAlerts), AlertPermission::Denied);
    }
}
