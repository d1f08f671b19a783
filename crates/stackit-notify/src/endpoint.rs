//! Push endpoint address.

use url::Url;

use crate::session::Credential;
use crate::{Error, Result};

/// Path of the push channel, relative to the server base.
pub const PUSH_PATH: &str = "notifications/ws";

/// The WebSocket URL the push connection is opened against.
///
/// Built from the server's base URL. `http` becomes `ws` and `https` becomes
/// `wss`; any base path is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEndpoint {
    url: Url,
}

impl PushEndpoint {
    /// Derive the push endpoint from a server base URL.
    pub fn from_base(base: &str) -> Result<Self> {
        let mut url = Url::parse(base)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::Endpoint(format!("unsupported scheme '{}'", other)));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::Endpoint(format!("cannot use scheme '{}'", scheme)))?;

        let path = format!("{}/{}", url.path().trim_end_matches('/'), PUSH_PATH);
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { url })
    }

    /// Use a complete WebSocket URL as-is.
    pub fn from_ws_url(ws_url: &str) -> Result<Self> {
        let mut url = Url::parse(ws_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Endpoint(format!(
                "expected ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }
        url.set_query(None);
        Ok(Self { url })
    }

    /// The endpoint without a credential.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL for one connection attempt, carrying the credential.
    pub fn url_for(&self, credential: &Credential) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("token", credential.as_str());
        url
    }
}
