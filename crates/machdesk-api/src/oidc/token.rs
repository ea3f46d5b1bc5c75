// Token endpoint payloads and claim extraction.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Error body returned by the token endpoint (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenErrorResponse {
    pub(crate) fn message(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{}: {desc}", self.error),
            None => self.error.clone(),
        }
    }
}

/// Token material issued by the provider.
///
/// Secrets are wrapped in [`SecretString`] so they never leak through
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub id_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub(crate) fn from_response(resp: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: SecretString::from(resp.access_token),
            refresh_token: resp.refresh_token.map(SecretString::from),
            id_token: resp.id_token.map(SecretString::from),
            expires_at: resp.expires_in.and_then(|s| expiry(issued_at, s)),
            // Keycloak reports 0 for offline tokens that never expire.
            refresh_expires_at: resp
                .refresh_expires_in
                .filter(|s| *s > 0)
                .and_then(|s| expiry(issued_at, s)),
        }
    }

    /// Claims of the identity token, falling back to the access token.
    pub fn claims(&self) -> Result<Map<String, Value>, Error> {
        let token = self.id_token.as_ref().unwrap_or(&self.access_token);
        decode_claims(token.expose_secret())
    }
}

/// `issued_at + secs`, or `None` when the lifetime is out of range.
fn expiry(issued_at: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|d| issued_at.checked_add_signed(d))
}

/// Decode the payload segment of a compact JWS into its claim map.
///
/// The signature is NOT verified -- the provider already validated the
/// token when it issued it, and resource servers re-validate on use.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, Error> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(Error::InvalidToken("expected three dot-separated segments".into())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::InvalidToken("payload is not a JSON object".into())),
        Err(e) => Err(Error::InvalidToken(format!("payload is not JSON: {e}"))),
    }
}
