// ── Session lifecycle ──
//
// The session gate owns the single authoritative `Session`. Everything
// else (router, resource store, hosts) holds a read-only `SessionHandle`
// that observes the latest settled value without awaiting.

mod gate;
mod oidc;
mod provider;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;

pub use gate::SessionGate;
pub use oidc::OidcProvider;
pub use provider::{Grant, IdentityProvider, InitMode, InitOptions};

// ── GateState ────────────────────────────────────────────────────

/// Lifecycle state of the session gate.
///
/// `Uninitialized -> Initializing -> {Authenticated, Unauthenticated, Failed}`.
/// After initialization the gate only moves between `Authenticated` and
/// `Unauthenticated`; it never re-enters `Initializing`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateState {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
    /// Provider initialization failed. Terminal.
    Failed,
}

impl GateState {
    /// `true` once initialization has resolved to a usable answer.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Authenticated | Self::Unauthenticated)
    }
}

// ── IdentityClaims ───────────────────────────────────────────────

/// Claims describing the authenticated principal, as issued by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IdentityClaims(Map<String, Value>);

impl IdentityClaims {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    pub fn preferred_username(&self) -> Option<&str> {
        self.0.get("preferred_username").and_then(Value::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// The `exp` claim as an instant.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.0.get("exp").and_then(Value::as_i64)?;
        DateTime::from_timestamp(exp, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for IdentityClaims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ── Credential ───────────────────────────────────────────────────

/// Opaque token material backing a session.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: SecretString) -> Self {
        Self {
            access_token,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// `true` if the access token expires within `window` of now.
    /// A credential without an expiry never needs refreshing.
    pub fn expires_within(&self, window: std::time::Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let Ok(window) = TimeDelta::from_std(window) else {
            return true;
        };
        Utc::now()
            .checked_add_signed(window)
            .is_none_or(|deadline| expires_at <= deadline)
    }
}

impl From<machdesk_api::TokenSet> for Credential {
    fn from(tokens: machdesk_api::TokenSet) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Point-in-time view of the authentication state.
///
/// Only the [`SessionGate`] produces new values. `is_authenticated()` is
/// derived from the state, so claims and credential can never be present
/// on an unauthenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    state: GateState,
    claims: IdentityClaims,
    credential: Option<Credential>,
    epoch: u64,
}

impl Session {
    pub(crate) fn with_state(state: GateState, epoch: u64) -> Self {
        Self {
            state,
            claims: IdentityClaims::default(),
            credential: None,
            epoch,
        }
    }

    /// A settled, unauthenticated session.
    pub fn unauthenticated() -> Self {
        Self::with_state(GateState::Unauthenticated, 0)
    }

    /// A settled, authenticated session.
    pub fn authenticated(claims: IdentityClaims, credential: Credential) -> Self {
        Self {
            state: GateState::Authenticated,
            claims,
            credential: Some(credential),
            epoch: 0,
        }
    }

    pub(crate) fn from_grant(grant: Grant, epoch: u64) -> Self {
        Self {
            state: GateState::Authenticated,
            claims: grant.claims,
            credential: Some(grant.credential),
            epoch,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == GateState::Authenticated
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Best display name for the principal.
    pub fn username(&self) -> Option<&str> {
        self.claims
            .preferred_username()
            .or_else(|| self.claims.subject())
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

// ── SessionHandle ────────────────────────────────────────────────

/// Read-only view of the gate's session.
///
/// Cheap to clone. `current()` never blocks and never awaits.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Arc<Session>>,
}

impl SessionHandle {
    pub(crate) fn new(rx: watch::Receiver<Arc<Session>>) -> Self {
        Self { rx }
    }

    /// A handle pinned to one session value, detached from any gate.
    ///
    /// Useful for evaluating routes offline or in tests.
    pub fn fixed(session: Session) -> Self {
        let (_tx, rx) = watch::channel(Arc::new(session));
        Self { rx }
    }

    pub fn current(&self) -> Arc<Session> {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> GateState {
        self.rx.borrow().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    /// Access token of the current session, if authenticated.
    pub fn bearer_token(&self) -> Option<SecretString> {
        let session = self.rx.borrow();
        if !session.is_authenticated() {
            return None;
        }
        session
            .credential
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Receiver for change notification.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.rx.clone()
    }
}
