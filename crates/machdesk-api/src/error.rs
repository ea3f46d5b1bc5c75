use thiserror::Error;

/// Top-level error type for the `machdesk-api` crate.
///
/// Covers every failure mode of the two HTTP surfaces this crate talks to:
/// the identity provider's token endpoints and the resource endpoint.
/// `machdesk-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The provider rejected the grant (wrong credentials, disabled client, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The refresh token was rejected (expired, revoked, or session ended).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// A token could not be decoded into claims.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Endpoint ────────────────────────────────────────────────────
    /// Non-2xx response from an endpoint.
    #[error("Endpoint returned HTTP {status}: {message}")]
    Endpoint { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired | Self::Endpoint { status: 401, .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Endpoint { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Endpoint { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_endpoint_counts_as_expired() {
        let err = Error::Endpoint {
            status: 401,
            message: "unauthorized".into(),
        };
        assert!(err.is_auth_expired());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Endpoint {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!Error::SessionExpired.is_transient());
    }
}
