// ── OpenID Connect identity provider ──
//
// Adapts `machdesk_api::OidcClient` to the `IdentityProvider` capability.
// Silent check = refresh of a remembered refresh token.
// Explicit login = resource-owner password grant with configured credentials.

use async_trait::async_trait;
use machdesk_api::{OidcClient, TokenSet, TransportConfig};
use secrecy::SecretString;
use tracing::debug;

use super::provider::{Grant, IdentityProvider, InitMode, InitOptions};
use super::{Credential, IdentityClaims};
use crate::config::ProviderConfig;
use crate::error::CoreError;

/// Identity provider backed by a Keycloak-style realm.
///
/// Uses direct grants only, so the browser-flow options of [`InitOptions`]
/// (`redirect_target`, `code_challenge_method`, `check_login_iframe`) are
/// accepted and ignored.
pub struct OidcProvider {
    client: OidcClient,
    username: Option<String>,
    password: Option<SecretString>,
    remembered: Option<SecretString>,
}

impl OidcProvider {
    pub fn new(client: OidcClient) -> Self {
        Self {
            client,
            username: None,
            password: None,
            remembered: None,
        }
    }

    pub fn from_config(
        config: &ProviderConfig,
        transport: &TransportConfig,
    ) -> Result<Self, CoreError> {
        let client = OidcClient::new(
            &config.url,
            &config.realm,
            config.client_id.clone(),
            transport,
        )?;
        let mut provider = Self::new(client);
        provider.username.clone_from(&config.username);
        provider.password.clone_from(&config.password);
        provider.remembered.clone_from(&config.refresh_token);
        Ok(provider)
    }

    /// Credentials for the password grant.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    /// Refresh token probed by the silent check.
    #[must_use]
    pub fn with_refresh_token(mut self, token: SecretString) -> Self {
        self.remembered = Some(token);
        self
    }

    async fn silent_check(&self) -> Result<Option<Grant>, CoreError> {
        let Some(token) = &self.remembered else {
            debug!("no remembered session to probe");
            return Ok(None);
        };
        match self.client.refresh(token).await {
            Ok(tokens) => grant_from(tokens, None).map(Some),
            Err(machdesk_api::Error::SessionExpired) => {
                debug!("remembered session is no longer active");
                Ok(None)
            }
            Err(e) => Err(CoreError::provider(e)),
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn init(&self, options: &InitOptions) -> Result<Option<Grant>, CoreError> {
        if let Some(target) = &options.redirect_target {
            debug!(%target, "silent-check redirect target (unused by direct grants)");
        }
        if let Some(grant) = self.silent_check().await? {
            return Ok(Some(grant));
        }
        match options.mode {
            InitMode::SilentCheck => Ok(None),
            InitMode::RequireLogin => self.login().await.map(Some),
        }
    }

    async fn login(&self) -> Result<Grant, CoreError> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(CoreError::AuthenticationFailed {
                message: "no username/password configured for this profile".into(),
            });
        };
        let tokens = self
            .client
            .password_grant(username, password)
            .await
            .map_err(CoreError::provider)?;
        grant_from(tokens, None)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Grant, CoreError> {
        let Some(refresh_token) = &credential.refresh_token else {
            return Err(CoreError::AuthSessionExpired);
        };
        let tokens = self
            .client
            .refresh(refresh_token)
            .await
            .map_err(CoreError::provider)?;
        grant_from(tokens, Some(refresh_token))
    }

    async fn logout(&self, credential: &Credential) -> Result<(), CoreError> {
        let Some(refresh_token) = &credential.refresh_token else {
            debug!("no refresh token, nothing to end at the provider");
            return Ok(());
        };
        self.client
            .end_session(refresh_token)
            .await
            .map_err(CoreError::provider)
    }
}

/// Build a grant, keeping the previous refresh token when the provider
/// does not rotate it.
fn grant_from(tokens: TokenSet, previous: Option<&SecretString>) -> Result<Grant, CoreError> {
    let claims = IdentityClaims::new(tokens.claims().map_err(CoreError::provider)?);
    let mut credential = Credential::from(tokens);
    if credential.refresh_token.is_none() {
        credential.refresh_token = previous.cloned();
    }
    Ok(Grant { claims, credential })
}
