// ── Session gate ──
//
// Sole writer of the `Session`. Every transition is a single `watch`
// assignment, so readers on other tasks always see a settled value.
// Provider round trips happen outside the assignment; their results are
// applied only if no logout happened in the meantime (epoch check).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::provider::{Grant, IdentityProvider, InitOptions};
use super::{GateState, Session, SessionHandle};
use crate::error::CoreError;

/// Default bound on provider initialization.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the authentication lifecycle against one identity provider.
pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    session: watch::Sender<Arc<Session>>,
    init_timeout: Option<Duration>,
    /// Serializes login and refresh round trips.
    op_lock: Mutex<()>,
}

impl SessionGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (session, _) = watch::channel(Arc::new(Session::with_state(
            GateState::Uninitialized,
            0,
        )));
        Self {
            provider,
            session,
            init_timeout: Some(DEFAULT_INIT_TIMEOUT),
            op_lock: Mutex::new(()),
        }
    }

    /// Bound provider initialization. A zero duration waits indefinitely.
    #[must_use]
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    // ── Observation ──────────────────────────────────────────────

    /// Latest session value. Never blocks.
    pub fn current_session(&self) -> Arc<Session> {
        self.session.borrow().clone()
    }

    pub fn state(&self) -> GateState {
        self.session.borrow().state()
    }

    /// Read-only handle for other components.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.session.subscribe())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.session.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the one-time provider initialization.
    ///
    /// Resolves to whether the user is authenticated. On provider error or
    /// timeout the gate enters [`GateState::Failed`] and stays there.
    pub async fn initialize(&self, options: &InitOptions) -> Result<bool, CoreError> {
        let mut prior = GateState::Uninitialized;
        let claimed = self.session.send_if_modified(|s| {
            if s.state() != GateState::Uninitialized {
                prior = s.state();
                return false;
            }
            *s = Arc::new(Session::with_state(GateState::Initializing, s.epoch()));
            true
        });
        if !claimed {
            return Err(CoreError::AlreadyInitialized { state: prior });
        }

        info!(
            mode = %options.mode,
            pkce = %options.code_challenge_method,
            check_login_iframe = options.check_login_iframe,
            "initializing session"
        );

        let outcome = match self.init_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.init(options))
                .await
                .unwrap_or_else(|_| {
                    Err(CoreError::AuthInit {
                        reason: format!("identity provider did not respond within {limit:?}"),
                    })
                }),
            None => self.provider.init(options).await,
        };

        let epoch = self.session.borrow().epoch();
        match outcome {
            Ok(Some(grant)) => {
                info!(user = grant.claims.preferred_username(), "session established");
                self.session
                    .send_replace(Arc::new(Session::from_grant(grant, epoch)));
                Ok(true)
            }
            Ok(None) => {
                debug!("no existing session");
                self.publish_state(GateState::Unauthenticated, epoch);
                Ok(false)
            }
            Err(e) => {
                let reason = match e {
                    CoreError::AuthInit { reason } => reason,
                    other => other.to_string(),
                };
                warn!(%reason, "session initialization failed");
                self.publish_state(GateState::Failed, epoch);
                Err(CoreError::AuthInit { reason })
            }
        }
    }

    /// Explicit login. A no-op when already authenticated.
    pub async fn login(&self) -> Result<(), CoreError> {
        let _guard = self.op_lock.lock().await;
        let current = self.current_session();
        match current.state() {
            GateState::Authenticated => return Ok(()),
            GateState::Unauthenticated => {}
            state => return Err(CoreError::NotReady { state }),
        }

        let grant = self.provider.login().await.map_err(|e| {
            warn!(error = %e, "login failed");
            match e {
                e @ CoreError::AuthenticationFailed { .. } => e,
                other => CoreError::AuthenticationFailed {
                    message: other.to_string(),
                },
            }
        })?;

        if self.apply_grant(grant, current.epoch()) {
            info!(user = self.current_session().username(), "logged in");
            Ok(())
        } else {
            Err(CoreError::AuthenticationFailed {
                message: "session was ended while login was in flight".into(),
            })
        }
    }

    /// Exchange the current credential for a fresh one.
    ///
    /// A rejected refresh ends the session and yields
    /// [`CoreError::AuthSessionExpired`]. Transient failures leave the
    /// session untouched.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _guard = self.op_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh only if the credential expires within `min_validity`.
    pub async fn ensure_fresh(&self, min_validity: Duration) -> Result<(), CoreError> {
        let _guard = self.op_lock.lock().await;
        let current = self.current_session();
        let stale = current.is_authenticated()
            && current
                .credential()
                .is_some_and(|c| c.expires_within(min_validity));
        if !stale {
            return Ok(());
        }
        debug!(?min_validity, "credential close to expiry, refreshing");
        self.refresh_locked().await
    }

    /// End the session.
    ///
    /// The local session is invalidated before the provider is contacted;
    /// a provider failure is logged and otherwise ignored.
    pub async fn logout(&self) {
        let mut ended = None;
        self.session.send_if_modified(|s| {
            if !s.state().is_settled() {
                return false;
            }
            ended = Some(Arc::clone(s));
            *s = Arc::new(Session::with_state(
                GateState::Unauthenticated,
                s.epoch() + 1,
            ));
            true
        });

        let Some(previous) = ended else {
            debug!("logout ignored, gate not settled");
            return;
        };
        let Some(credential) = previous.credential() else {
            debug!("logout without an active session");
            return;
        };

        info!(user = previous.username(), "logged out");
        if let Err(e) = self.provider.logout(credential).await {
            warn!(error = %e, "provider logout failed (non-fatal)");
        }
    }

    // ── Private helpers ──────────────────────────────────────────

    async fn refresh_locked(&self) -> Result<(), CoreError> {
        let current = self.current_session();
        let credential = match current.credential() {
            Some(c) if current.is_authenticated() => c.clone(),
            _ if current.state().is_settled() => return Err(CoreError::AuthSessionExpired),
            _ => {
                return Err(CoreError::NotReady {
                    state: current.state(),
                });
            }
        };

        match self.provider.refresh(&credential).await {
            Ok(grant) => {
                if self.apply_grant(grant, current.epoch()) {
                    debug!("credential refreshed");
                    Ok(())
                } else {
                    Err(CoreError::AuthSessionExpired)
                }
            }
            Err(e @ (CoreError::AuthSessionExpired | CoreError::AuthenticationFailed { .. })) => {
                warn!(error = %e, "refresh rejected, ending session");
                self.session.send_if_modified(|s| {
                    if s.epoch() != current.epoch() || !s.is_authenticated() {
                        return false;
                    }
                    *s = Arc::new(Session::with_state(
                        GateState::Unauthenticated,
                        s.epoch() + 1,
                    ));
                    true
                });
                Err(CoreError::AuthSessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping session");
                Err(e)
            }
        }
    }

    /// Publish an authenticated session unless a logout bumped the epoch.
    fn apply_grant(&self, grant: Grant, epoch: u64) -> bool {
        self.session.send_if_modified(|s| {
            if s.epoch() != epoch {
                return false;
            }
            *s = Arc::new(Session::from_grant(grant, epoch));
            true
        })
    }

    fn publish_state(&self, state: GateState, epoch: u64) {
        self.session
            .send_replace(Arc::new(Session::with_state(state, epoch)));
    }
}
