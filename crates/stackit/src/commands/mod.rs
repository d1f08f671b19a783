//! CLI command handlers.

pub mod config;
pub mod list;
pub mod read_all;
pub mod token;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use stackit_client::StackitClient;
use stackit_config::{ClientConfig, NotificationSettings};
use stackit_notify::{CredentialStore, NotificationStore, StoreConfig};

/// Server used when neither a flag nor a context names one.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// `--server` override.
    pub server_override: Option<String>,
    /// `--context` override.
    pub context_name: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Everything a command needs to talk to one server.
#[derive(Debug, Clone)]
pub struct Target {
    pub context: Option<String>,
    pub server_url: String,
    pub ws_base: Option<String>,
    pub token_path: Option<PathBuf>,
    pub credential: Option<String>,
    pub timeout: Duration,
    pub settings: NotificationSettings,
}

impl Context {
    pub fn load_config(&self) -> Result<ClientConfig> {
        stackit_config::load_client_config().context("failed to load client config")
    }

    /// Resolve flags and the selected context into a [`Target`].
    pub fn target(&self) -> Result<Target> {
        let config = self.load_config()?;

        let selected = match &self.context_name {
            Some(name) => Some(
                config
                    .get_context(name)
                    .with_context(|| format!("context '{}' not found", name))?,
            ),
            None => config.current(),
        };

        let server_url = self
            .server_override
            .clone()
            .or_else(|| selected.map(|c| c.server.clone()))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let token_path = match selected {
            Some(c) => c.token_path(),
            None => stackit_config::default_token_path(),
        };

        let credential = match selected.and_then(|c| c.auth.as_ref()) {
            Some(auth) => auth.resolve()?,
            None => match &token_path {
                Some(path) => stackit_config::read_token(path)?,
                None => None,
            },
        };

        let timeout = match selected {
            Some(c) => c.effective_timeout(&config.defaults),
            None => config.defaults.timeout,
        };

        Ok(Target {
            context: selected.map(|c| c.name.clone()),
            server_url,
            // An explicit --server wins over the context's push server.
            ws_base: if self.server_override.is_some() {
                None
            } else {
                selected.and_then(|c| c.ws_server.clone())
            },
            token_path,
            credential,
            timeout: Duration::from_secs(timeout),
            settings: config.notifications,
        })
    }
}

impl Target {
    /// Session seeded with the resolved credential.
    pub fn session(&self) -> CredentialStore {
        match &self.credential {
            Some(token) => CredentialStore::with_token(token.clone()),
            None => CredentialStore::new(),
        }
    }

    /// REST client reading its credential from `session` on every request.
    pub fn api_client(&self, session: &CredentialStore) -> Result<StackitClient> {
        StackitClient::builder()
            .base_url(&self.server_url)
            .token_provider(Arc::new(session.clone()))
            .timeout(self.timeout)
            .build()
            .with_context(|| format!("invalid server URL '{}'", self.server_url))
    }

    pub fn store(&self, client: StackitClient) -> NotificationStore {
        NotificationStore::new(
            Arc::new(client),
            StoreConfig::default().with_stale_time(self.settings.stale_time()),
        )
    }
}

/// Shared hint for commands that need a credential.
pub fn login_hint() -> &'static str {
    "Store a credential with: stackit token set <TOKEN>"
}
