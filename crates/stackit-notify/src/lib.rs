//! Real-time notification delivery for StackIt clients.
//!
//! Keeps one authenticated push connection open while a session is active,
//! turns push frames into unread-count patches and cache invalidations on a
//! [`NotificationStore`], and raises alerts through a host [`Alerter`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stackit_client::StackitClient;
//! use stackit_notify::{
//!     CredentialStore, NotificationStore, PushClient, PushEndpoint, StoreConfig,
//! };
//!
//! # async fn example() -> stackit_notify::Result<()> {
//! let session = CredentialStore::with_token("secret");
//! let api = StackitClient::builder()
//!     .base_url("http://localhost:8000")
//!     .token_provider(Arc::new(session.clone()))
//!     .build()?;
//!
//! let store = NotificationStore::new(Arc::new(api), StoreConfig::default());
//! let endpoint = PushEndpoint::from_base("http://localhost:8000")?;
//! let push = PushClient::builder(Arc::new(session), store.clone(), endpoint).spawn();
//!
//! let mut events = push.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{} ({} unread)", event.message, store.unread_count());
//! }
//! push.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod connector;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod ws;

pub use alert::{Alert, AlertPermission, Alerter, NoAlerts, ensure_permission};
pub use connector::{AttemptSink, CloseRequest, ConnectionHandle, Connector};
pub use dispatcher::{DEFAULT_ALERT_TITLE, EventDispatcher};
pub use endpoint::PushEndpoint;
pub use error::{Error, Result};
pub use manager::{AttemptId, Command, ConnectionManager, ConnectionState, ManagerEvent};
pub use protocol::PushEvent;
pub use runtime::{PushClient, PushClientBuilder};
pub use scheduler::{ReconnectScheduler, RetryPolicy, TimerId};
pub use session::{Credential, CredentialStore, SessionGate};
pub use store::{MemorySource, NotificationSource, NotificationStore, StoreConfig};
pub use ws::WsConnector;
