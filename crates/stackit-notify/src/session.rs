//! Session gate: who the push connection is opened for.
//!
//! The connection manager never reads credentials from ambient storage. It
//! asks a [`SessionGate`] for the current credential and listens on the
//! gate's watch channel for changes.

use std::fmt;
use std::sync::Arc;

use stackit_client::TokenProvider;
use tokio::sync::watch;
use tracing::{debug, info};

/// An opaque session credential.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Blank tokens are not credentials.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Read access to the current session.
pub trait SessionGate: Send + Sync {
    /// The credential the connection should use, if a session is active.
    fn credential(&self) -> Option<Credential>;

    /// Watch channel that changes whenever the credential changes.
    fn subscribe(&self) -> watch::Receiver<Option<Credential>>;

    fn is_active(&self) -> bool {
        self.credential().is_some()
    }
}

/// In-process session holder backed by a watch channel.
///
/// Clones share the same session. Also serves as the REST client's
/// [`TokenProvider`], so a 401 from the API ends the session everywhere.
#[derive(Clone)]
pub struct CredentialStore {
    tx: Arc<watch::Sender<Option<Credential>>>,
}

impl CredentialStore {
    /// Start without a session.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Start with a session for `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.login(token);
        store
    }

    /// Begin (or replace) the session. Returns `true` if the credential changed.
    pub fn login(&self, token: impl Into<String>) -> bool {
        self.replace(Credential::new(token))
    }

    /// End the session. Returns `true` if one was active.
    pub fn logout(&self) -> bool {
        self.replace(None)
    }

    fn replace(&self, next: Option<Credential>) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            debug!(active = next.is_some(), "session changed");
        }
        changed
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("active", &self.is_active())
            .finish()
    }
}

impl SessionGate for CredentialStore {
    fn credential(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }
}

impl TokenProvider for CredentialStore {
    fn token(&self) -> Option<String> {
        self.credential().map(|c| c.0)
    }

    fn on_unauthorized(&self) {
        if self.logout() {
            info!("credential rejected by server, session cleared");
        }
    }
}
