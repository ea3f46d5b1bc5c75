// Identity provider HTTP client
//
// Password and refresh-token grants against the realm's token endpoint,
// plus back-channel logout. Each call returns a fresh `TokenSet`; the
// caller owns the resulting session state.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use super::Endpoint;
use super::token::{TokenErrorResponse, TokenResponse, TokenSet};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Async client for one realm of an OpenID Connect provider.
pub struct OidcClient {
    http: reqwest::Client,
    realm_url: Url,
    client_id: String,
}

impl OidcClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the provider root (e.g. `http://localhost:8080`);
    /// realm endpoints are derived from it.
    pub fn new(
        base_url: &Url,
        realm: &str,
        client_id: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url, realm, client_id)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        realm: &str,
        client_id: impl Into<String>,
    ) -> Result<Self, Error> {
        let base = base_url.as_str().trim_end_matches('/');
        let realm_url = Url::parse(&format!(
            "{base}/realms/{realm}/protocol/openid-connect/"
        ))?;
        Ok(Self {
            http,
            realm_url,
            client_id: client_id.into(),
        })
    }

    /// The configured client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Absolute URL of a realm endpoint.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, Error> {
        Ok(self.realm_url.join(endpoint.path())?)
    }

    /// Resource-owner password grant.
    ///
    /// Used by hosts that cannot follow browser redirects. The provider
    /// client must have "direct access grants" enabled.
    pub async fn password_grant(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<TokenSet, Error> {
        debug!(client_id = %self.client_id, username, "requesting password grant");

        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", username),
            ("password", password.expose_secret()),
            ("scope", "openid"),
        ];

        self.token_request(&form).await.map_err(|e| match e {
            Error::Endpoint { status, message } if status == 400 || status == 401 => {
                Error::Authentication { message }
            }
            other => other,
        })
    }

    /// Exchange a refresh token for a new token set.
    ///
    /// A rejected refresh token (`invalid_grant`) maps to
    /// [`Error::SessionExpired`]: the provider session is gone and the
    /// user must log in again.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenSet, Error> {
        debug!(client_id = %self.client_id, "refreshing tokens");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
        ];

        self.token_request(&form).await.map_err(|e| match e {
            Error::Endpoint { status, .. } if status == 400 || status == 401 => {
                Error::SessionExpired
            }
            other => other,
        })
    }

    /// End the provider session tied to `refresh_token`.
    pub async fn end_session(&self, refresh_token: &SecretString) -> Result<(), Error> {
        let url = self.endpoint_url(Endpoint::Logout)?;
        debug!("ending provider session at {}", url);

        let form = [
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
        ];

        let resp = self.http.post(url).form(&form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Endpoint {
                status: status.as_u16(),
                message: body,
            });
        }

        debug!("provider session ended");
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, Error> {
        let url = self.endpoint_url(Endpoint::Token)?;
        let issued_at = Utc::now();

        let resp = self.http.post(url).form(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |e| e.message());
            return Err(Error::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        Ok(TokenSet::from_response(parsed, issued_at))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn realm_endpoints_are_derived_from_base() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        let client =
            OidcClient::with_client(reqwest::Client::new(), &base, "machine_management", "frontend")
                .unwrap();

        assert_eq!(
            client.endpoint_url(Endpoint::Token).unwrap().as_str(),
            "http://localhost:8080/realms/machine_management/protocol/openid-connect/token"
        );
        assert_eq!(
            client.endpoint_url(Endpoint::Logout).unwrap().path(),
            "/realms/machine_management/protocol/openid-connect/logout"
        );
    }
}
