// ── Router ──
//
// Host-facing navigation: resolve, authorize, follow redirects, record
// the current route. Reads the session synchronously; never awaits.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use super::{
    MAX_REDIRECTS, NavigationDecision, RedirectReason, Resolution, ResolvedRoute, RouteTable,
    authorize, normalize,
};
use crate::error::CoreError;
use crate::session::SessionHandle;

/// One redirect followed during a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectHop {
    pub from: String,
    pub to: String,
    pub reason: RedirectReason,
}

/// Where a navigation ended and how it got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationOutcome {
    pub route: ResolvedRoute,
    pub redirects: Vec<RedirectHop>,
}

impl NavigationOutcome {
    pub fn was_redirected(&self) -> bool {
        !self.redirects.is_empty()
    }
}

/// Applies the authorizer to every navigation against one route table.
pub struct Router {
    table: Arc<RouteTable>,
    session: SessionHandle,
    current: watch::Sender<Option<ResolvedRoute>>,
}

impl Router {
    pub fn new(table: Arc<RouteTable>, session: SessionHandle) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            table,
            session,
            current,
        }
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// The route the last successful navigation landed on.
    pub fn current_route(&self) -> Option<ResolvedRoute> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ResolvedRoute>> {
        self.current.subscribe()
    }

    /// Navigate to `path`, following redirects.
    ///
    /// Refused with [`CoreError::NotReady`] until the session gate has
    /// settled. A redirect chain that revisits a path or exceeds
    /// [`MAX_REDIRECTS`] fails with [`CoreError::RedirectLoop`].
    pub fn navigate(&self, path: &str) -> Result<NavigationOutcome, CoreError> {
        let session = self.session.current();
        if !session.state().is_settled() {
            return Err(CoreError::NotReady {
                state: session.state(),
            });
        }

        let requested = normalize(path);
        let from = self.current_route();
        let mut path = requested.clone();
        let mut redirects: Vec<RedirectHop> = Vec::new();

        loop {
            let target = self.table.resolve(&path);
            match authorize(&self.table, &target, from.as_ref(), &session) {
                NavigationDecision::Allow => {
                    let Resolution::Matched(route) = target else {
                        return Err(CoreError::Internal(format!(
                            "authorizer allowed unmatched path {path}"
                        )));
                    };
                    info!(
                        path = %route.path,
                        name = %route.descriptor.name,
                        redirects = redirects.len(),
                        "navigated"
                    );
                    self.current.send_replace(Some(route.clone()));
                    return Ok(NavigationOutcome { route, redirects });
                }
                NavigationDecision::Redirect { to, reason } => {
                    debug!(from = %path, %to, %reason, "redirect");
                    let revisits =
                        to == requested || redirects.iter().any(|hop| hop.from == to);
                    if revisits || redirects.len() >= MAX_REDIRECTS {
                        return Err(CoreError::RedirectLoop { path: requested });
                    }
                    redirects.push(RedirectHop {
                        from: std::mem::replace(&mut path, to.clone()),
                        to,
                        reason,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::navigation::RouteDescriptor;
    use crate::session::{Credential, GateState, IdentityClaims, Session};
    use secrecy::SecretString;

    fn router(session: Session) -> Router {
        Router::new(
            Arc::new(RouteTable::default()),
            SessionHandle::fixed(session),
        )
    }

    fn signed_in() -> Session {
        Session::authenticated(
            IdentityClaims::default(),
            Credential::new(SecretString::from("t".to_string())),
        )
    }

    #[test]
    fn anonymous_dashboard_lands_on_login() {
        let router = router(Session::unauthenticated());
        let outcome = router.navigate("/dashboard").unwrap();

        assert_eq!(outcome.route.path, "/");
        assert_eq!(outcome.redirects.len(), 1);
        assert_eq!(outcome.redirects[0].reason, RedirectReason::LoginRequired);
        assert_eq!(router.current_route().unwrap().path, "/");
    }

    #[test]
    fn signed_in_login_lands_on_dashboard() {
        let router = router(signed_in());
        let outcome = router.navigate("/").unwrap();
        assert_eq!(outcome.route.descriptor.name, "Dashboard");
    }

    #[test]
    fn signed_in_unknown_route_ends_on_dashboard() {
        let router = router(signed_in());
        let outcome = router.navigate("/does-not-exist").unwrap();

        let reasons: Vec<RedirectReason> = outcome.redirects.iter().map(|h| h.reason).collect();
        assert_eq!(
            reasons,
            [RedirectReason::UnknownRoute, RedirectReason::AlreadyAuthenticated]
        );
        assert_eq!(outcome.route.path, "/dashboard");
    }

    #[test]
    fn allowed_navigation_has_no_redirects() {
        let router = router(signed_in());
        let outcome = router.navigate("/machines/").unwrap();
        assert!(!outcome.was_redirected());
        assert_eq!(outcome.route.path, "/machines");
    }

    #[test]
    fn unsettled_gate_refuses_navigation() {
        let (_tx, rx) = watch::channel(Arc::new(Session::with_state(GateState::Initializing, 0)));
        let router = Router::new(Arc::new(RouteTable::default()), SessionHandle::new(rx));
        let err = router.navigate("/").unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotReady {
                state: GateState::Initializing
            }
        ));
        assert!(router.current_route().is_none());
    }

    #[test]
    fn no_valid_table_loops_for_any_session() {
        let table = RouteTable::new(
            vec![
                RouteDescriptor::public("/login", "Login"),
                RouteDescriptor::public("/about", "About"),
                RouteDescriptor::protected("/home", "Home"),
            ],
            "/login",
            "/home",
        )
        .unwrap();
        let table = Arc::new(table);

        for session in [Session::unauthenticated(), signed_in()] {
            let router = Router::new(Arc::clone(&table), SessionHandle::fixed(session));
            for path in ["/", "/login", "/about", "/home", "/x/y"] {
                let outcome = router.navigate(path).unwrap();
                assert!(outcome.redirects.len() <= 2, "{path}: {outcome:?}");
            }
        }
    }
}
