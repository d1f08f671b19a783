//! Terminal alerts.

use console::{Style, Term};
use parking_lot::Mutex;
use stackit_config::AlertMode;
use stackit_notify::{Alert, AlertPermission, Alerter};

/// Prints alerts to the terminal with a bell.
pub struct TerminalAlerter {
    permission: Mutex<AlertPermission>,
    term: Term,
}

impl TerminalAlerter {
    pub fn new(mode: AlertMode) -> Self {
        let permission = match mode {
            AlertMode::Ask => AlertPermission::Default,
            AlertMode::Always => AlertPermission::Granted,
            AlertMode::Never => AlertPermission::Denied,
        };
        Self {
            permission: Mutex::new(permission),
            term: Term::stdout(),
        }
    }
}

impl Alerter for TerminalAlerter {
    fn permission(&self) -> AlertPermission {
        *self.permission.lock()
    }

    fn request_permission(&self) -> AlertPermission {
        // Nobody to ask when output is piped.
        let decided = if !self.term.is_term() {
            AlertPermission::Denied
        } else {
            let _ = self.term.write_str("Show alerts for new notifications? [Y/n] ");
            match self.term.read_line() {
                Ok(answer) if answer.trim().is_empty() || answer.trim().eq_ignore_ascii_case("y") => {
                    AlertPermission::Granted
                }
                _ => AlertPermission::Denied,
            }
        };
        *self.permission.lock() = decided;
        decided
    }

    fn show(&self, alert: &Alert) -> stackit_notify::Result<()> {
        let title = Style::new().bold().yellow().apply_to(&alert.title);
        self.term
            .write_line(&format!("\x07{} {}", title, alert.body))
            .map_err(|e| stackit_notify::Error::Alert(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_maps_to_permission() {
        assert_eq!(
            TerminalAlerter::new(AlertMode::Ask).permission(),
            AlertPermission::Default
        );
        assert_eq!(
            TerminalAlerter::new(AlertMode::Always).permission(),
            AlertPermission::Granted
        );
        assert_eq!(
            TerminalAlerter::new(AlertMode::Never).permission(),
            AlertPermission::Denied
        );
    }
}
