// ── Runtime client configuration ──
//
// These types describe *where* the identity provider and the resource
// API live and how the client should behave. They carry credential data
// and tuning, but never touch disk. The CLI constructs a `ClientConfig`
// and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use machdesk_api::{TlsMode, TransportConfig};

use crate::session::InitOptions;
use crate::store::{FetchPolicy, PageParams, PatchMissPolicy};

/// Identity provider coordinates and optional direct-grant credentials.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider root (e.g. `http://localhost:8080`).
    pub url: Url,
    pub realm: String,
    pub client_id: String,
    /// Used by the password grant on explicit login.
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Offline or remembered refresh token used for the silent check.
    pub refresh_token: Option<SecretString>,
}

/// Location of the resource collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEndpoint {
    /// API root (e.g. `http://127.0.0.1:5000`).
    pub base_url: Url,
    /// Collection path relative to the root.
    pub path: String,
    /// Response body field holding the records.
    pub collection_field: String,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development setups).
    DangerAcceptInvalid,
}

/// Everything a [`Client`](crate::Client) needs.
///
/// Built by the CLI, passed to `Client` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: ProviderConfig,
    pub resources: ResourceEndpoint,
    pub init: InitOptions,
    /// Bound on provider initialization. Zero waits indefinitely.
    pub init_timeout: Duration,
    pub tls: TlsVerification,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// How often to re-fetch the collection (seconds). 0 = never.
    pub refresh_interval_secs: u64,
    pub page: PageParams,
    pub patch_miss: PatchMissPolicy,
    pub fetch_policy: FetchPolicy,
    /// Refresh the credential before a fetch if it expires within this window.
    pub token_min_validity: Duration,
}

impl ClientConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8080").expect("static URL is valid"),
            realm: "machine_management".into(),
            client_id: "frontend".into(),
            username: None,
            password: None,
            refresh_token: None,
        }
    }
}

impl Default for ResourceEndpoint {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:5000").expect("static URL is valid"),
            path: "machines".into(),
            collection_field: "machines".into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            resources: ResourceEndpoint::default(),
            init: InitOptions::default(),
            init_timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            refresh_interval_secs: 0,
            page: PageParams::default(),
            patch_miss: PatchMissPolicy::default(),
            fetch_policy: FetchPolicy::default(),
            token_min_validity: Duration::from_secs(30),
        }
    }
}
