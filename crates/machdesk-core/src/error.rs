// ── Core error types ──
//
// User-facing errors from machdesk-core. These are NOT transport-specific --
// consumers never see raw HTTP errors or JSON parse failures directly.
// The `From<machdesk_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

use crate::model::EntityId;
use crate::session::GateState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// Identity provider initialization failed. The host must not mount
    /// protected views.
    #[error("Authentication initialization failed: {reason}")]
    AuthInit { reason: String },

    /// The session was invalidated mid-use (refresh rejected).
    #[error("Session expired -- log in again")]
    AuthSessionExpired,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The provider could not be reached or answered unexpectedly.
    #[error("Identity provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },

    #[error("Session gate already initialized (state: {state})")]
    AlreadyInitialized { state: GateState },

    /// The session gate has not settled; routing and login are refused.
    #[error("Session not ready (state: {state})")]
    NotReady { state: GateState },

    // ── Navigation errors ────────────────────────────────────────────
    #[error("Redirect loop while navigating to {path}")]
    RedirectLoop { path: String },

    #[error("Invalid route table: {message}")]
    InvalidRoutes { message: String },

    // ── Resource errors ──────────────────────────────────────────────
    /// Network, timeout, or non-2xx failure on the resource endpoint.
    /// The collection is left unchanged.
    #[error("Resource fetch failed: {reason}")]
    ResourceFetch { reason: String, status: Option<u16> },

    #[error("Patch target not found: {id}")]
    PatchTargetNotFound { id: EntityId },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a resource-endpoint failure, keeping the HTTP status if any.
    pub(crate) fn resource_fetch(err: &machdesk_api::Error) -> Self {
        Self::ResourceFetch {
            reason: err.to_string(),
            status: err.status(),
        }
    }

    /// Translate an identity-provider failure. Rejections keep their
    /// meaning; everything else is an availability problem.
    pub(crate) fn provider(err: machdesk_api::Error) -> Self {
        match err {
            machdesk_api::Error::SessionExpired => Self::AuthSessionExpired,
            machdesk_api::Error::Authentication { message } => {
                Self::AuthenticationFailed { message }
            }
            machdesk_api::Error::InvalidToken(reason) => Self::AuthenticationFailed {
                message: format!("provider issued an unreadable token: {reason}"),
            },
            other => Self::ProviderUnavailable {
                reason: other.to_string(),
            },
        }
    }

    /// Returns `true` if the resource endpoint rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::ResourceFetch {
                status: Some(401),
                ..
            } | Self::AuthSessionExpired
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<machdesk_api::Error> for CoreError {
    fn from(err: machdesk_api::Error) -> Self {
        match err {
            machdesk_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            machdesk_api::Error::SessionExpired => CoreError::AuthSessionExpired,
            machdesk_api::Error::InvalidToken(reason) => CoreError::AuthenticationFailed {
                message: format!("provider issued an unreadable token: {reason}"),
            },
            machdesk_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            machdesk_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            other @ (machdesk_api::Error::Transport(_)
            | machdesk_api::Error::Timeout { .. }
            | machdesk_api::Error::Endpoint { .. }
            | machdesk_api::Error::Deserialization { .. }) => CoreError::resource_fetch(&other),
        }
    }
}
