//! Client configuration for StackIt notification clients.
//!
//! Provides a kubeconfig-style YAML file with:
//! - Named connection contexts (REST server, push server, auth)
//! - `current-context` for default selection
//! - Credential resolution (token file, then environment variable)
//! - Push connection and cache tunables (`notifications:`)

pub mod client;
pub mod error;
pub mod notifications;
pub mod paths;

pub use client::{
    AuthConfig, ClientConfig, ClientDefaults, Context, clear_token, client_config_path,
    default_token_path, load_client_config, load_client_config_from, read_token,
    save_client_config, save_client_config_to, save_token,
};
pub use error::{ConfigError, Result};
pub use notifications::{AlertMode, NotificationSettings};
pub use paths::xdg_config_dir;
