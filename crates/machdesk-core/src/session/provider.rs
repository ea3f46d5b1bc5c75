// ── Identity provider capability ──
//
// The gate talks to the identity provider only through this trait.
// Providers are stateless with respect to the session: they return
// grants, and the gate decides what the session becomes.

use async_trait::async_trait;
use machdesk_api::CodeChallengeMethod;
use url::Url;

use super::{Credential, IdentityClaims};
use crate::error::CoreError;

/// Outcome of a successful provider round trip.
#[derive(Debug, Clone)]
pub struct Grant {
    pub claims: IdentityClaims,
    pub credential: Credential,
}

/// How initialization should treat a missing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum InitMode {
    /// Probe for an existing session without prompting.
    #[default]
    SilentCheck,
    /// Probe, then log in if no session exists.
    RequireLogin,
}

/// Options passed to the provider's `init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub mode: InitMode,
    /// Callback used by browser-capable providers for the silent check.
    pub redirect_target: Option<Url>,
    pub code_challenge_method: CodeChallengeMethod,
    /// Whether the provider should poll its login-status frame.
    pub check_login_iframe: bool,
}

/// Capability interface to an external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the initial session. `Ok(None)` means no session exists.
    async fn init(&self, options: &InitOptions) -> Result<Option<Grant>, CoreError>;

    /// Explicit login.
    async fn login(&self) -> Result<Grant, CoreError>;

    /// Exchange a credential for a fresh one.
    async fn refresh(&self, credential: &Credential) -> Result<Grant, CoreError>;

    /// End the provider-side session.
    async fn logout(&self, credential: &Credential) -> Result<(), CoreError>;
}
