//! HTTP client SDK for the StackIt notifications API.
//!
//! # Example
//!
//! ```no_run
//! use stackit_client::{StackitClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = StackitClient::builder()
//!     .base_url("http://localhost:8000")
//!     .auth_token("secret")
//!     .build()?;
//!
//! for n in client.notifications().list().await? {
//!     println!("{} {}", if n.is_read { " " } else { "*" }, n.message);
//! }
//!
//! client.notifications().mark_all_read().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientBuilder, StackitClient, StaticToken, TokenProvider};
pub use error::{Error, Result};
pub use types::*;

pub use api::NotificationsApi;
