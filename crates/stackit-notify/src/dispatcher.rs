//! Turns push frames into cache updates and alerts.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::alert::{Alert, AlertPermission, Alerter};
use crate::protocol::PushEvent;
use crate::store::NotificationStore;

/// Title used when none is configured.
pub const DEFAULT_ALERT_TITLE: &str = "StackIt";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Applies decoded push events.
///
/// For each frame: patch the unread projection, invalidate the cached list,
/// then alert if permitted. A failed alert never undoes the cache updates.
pub struct EventDispatcher {
    store: NotificationStore,
    alerter: Arc<dyn Alerter>,
    title: String,
    events: broadcast::Sender<PushEvent>,
}

impl EventDispatcher {
    pub fn new(store: NotificationStore, alerter: Arc<dyn Alerter>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            alerter,
            title: DEFAULT_ALERT_TITLE.to_string(),
            events,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Receive every applied event.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<PushEvent> {
        self.events.clone()
    }

    /// Handle one text frame. Malformed frames are logged and dropped.
    pub fn dispatch(&self, text: &str) -> Option<PushEvent> {
        let event = match PushEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed push frame");
                return None;
            }
        };

        self.store.patch_unread_count(event.unread_count);
        self.store.invalidate();
        self.alert(&event);

        debug!(unread = event.unread_count, "push event applied");
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        Some(event)
    }

    fn alert(&self, event: &PushEvent) {
        match self.alerter.permission() {
            AlertPermission::Granted => {
                let alert = Alert {
                    title: self.title.clone(),
                    body: event.message.clone(),
                };
                if let Err(e) = self.alerter.show(&alert) {
                    warn!(error = %e, "failed to show alert");
                }
            }
            permission => debug!(%permission, "alert suppressed"),
        }
    }
}
