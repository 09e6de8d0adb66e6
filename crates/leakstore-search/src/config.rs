//! Search Backend Connection Configuration
//!
//! Where the backend lives and how to authenticate against it. The config
//! deserializes from the CLI's TOML config file and from flags; the `auth`
//! table is tagged so the two credential shapes stay unambiguous:
//!
//! ```toml
//! endpoint = "https://search.internal:9200"
//! ignore_ssl = false
//!
//! [auth]
//! type = "apikey"
//! key = "base64key=="
//! ```
//!
//! or
//!
//! ```toml
//! [auth]
//! type = "creds"
//! username = "reader"
//! password = "hunter2"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Credentials for the search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Auth {
    /// API key sent as `Authorization: ApiKey <key>`.
    #[serde(rename = "apikey")]
    ApiKey { key: String },

    /// HTTP basic auth.
    #[serde(rename = "creds")]
    Credentials { username: String, password: String },
}

/// Connection settings for one search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL, scheme included.
    pub endpoint: String,

    #[serde(default)]
    pub auth: Option<Auth>,

    /// Skip TLS certificate verification. Only for backends with
    /// self-signed certificates on trusted networks.
    #[serde(default)]
    pub ignore_ssl: bool,
}

impl SearchConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: None,
            ignore_ssl: false,
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_ignore_ssl(mut self, ignore_ssl: bool) -> Self {
        self.ignore_ssl = ignore_ssl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(SearchError::Config("endpoint is empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(SearchError::Config(format!(
                "endpoint must carry a scheme: {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    /// Endpoint with any trailing slash removed, ready for path joining.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}
