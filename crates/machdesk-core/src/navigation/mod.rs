// ── Navigation authorizer ──
//
// Static route table plus the pure decision function consulted before
// every navigation. The `Router` applies decisions and follows redirects.

mod router;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::session::Session;

pub use router::{NavigationOutcome, Router};

/// Upper bound on redirects followed by a single navigation.
pub const MAX_REDIRECTS: usize = 8;

// ── Route table ──────────────────────────────────────────────────

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    /// Path pattern; `:name` segments match any single segment.
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
}

impl RouteDescriptor {
    pub fn public(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            requires_auth: false,
        }
    }

    pub fn protected(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            requires_auth: true,
        }
    }

    /// Match a normalized path, returning captured `:param` segments.
    fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let pattern: Vec<&str> = segments(&self.path).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (p, a) in pattern.iter().zip(&actual) {
            if let Some(name) = p.strip_prefix(':') {
                params.insert(name.to_owned(), (*a).to_owned());
            } else if p != a {
                return None;
            }
        }
        Some(params)
    }
}

/// A path resolved against the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRoute {
    pub descriptor: RouteDescriptor,
    /// The normalized concrete path.
    pub path: String,
    pub params: BTreeMap<String, String>,
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched(ResolvedRoute),
    /// No descriptor matched; the catch-all applies.
    Unmatched { path: String },
}

/// Ordered route descriptors plus the login and landing paths.
///
/// Immutable after construction. First structural match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    login_path: String,
    landing_path: String,
}

impl RouteTable {
    /// Build a table. The login and landing paths must resolve to
    /// descriptors; the login route must be public and the landing route
    /// must not be the login route.
    pub fn new(
        routes: Vec<RouteDescriptor>,
        login_path: &str,
        landing_path: &str,
    ) -> Result<Self, CoreError> {
        let table = Self {
            routes,
            login_path: normalize(login_path),
            landing_path: normalize(landing_path),
        };

        let Resolution::Matched(login) = table.resolve(&table.login_path) else {
            return Err(CoreError::InvalidRoutes {
                message: format!("login path {} has no route", table.login_path),
            });
        };
        if login.descriptor.requires_auth {
            return Err(CoreError::InvalidRoutes {
                message: format!("login route {} must be public", login.path),
            });
        }
        if !matches!(table.resolve(&table.landing_path), Resolution::Matched(_)) {
            return Err(CoreError::InvalidRoutes {
                message: format!("landing path {} has no route", table.landing_path),
            });
        }
        if table.landing_path == table.login_path {
            return Err(CoreError::InvalidRoutes {
                message: "landing path must differ from the login path".into(),
            });
        }
        Ok(table)
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub fn is_login_path(&self, path: &str) -> bool {
        normalize(path) == self.login_path
    }

    /// Resolve a raw path (query and fragment are ignored).
    pub fn resolve(&self, raw: &str) -> Resolution {
        let path = normalize(raw);
        for descriptor in &self.routes {
            if let Some(params) = descriptor.matches(&path) {
                return Resolution::Matched(ResolvedRoute {
                    descriptor: descriptor.clone(),
                    path,
                    params,
                });
            }
        }
        Resolution::Unmatched { path }
    }
}

impl Default for RouteTable {
    /// The application's view table.
    fn default() -> Self {
        Self {
            routes: vec![
                RouteDescriptor::public("/", "Login"),
                RouteDescriptor::protected("/dashboard", "Dashboard"),
                RouteDescriptor::protected("/machines", "Machines"),
                RouteDescriptor::protected("/tools", "Tools"),
                RouteDescriptor::protected("/register-maintenance", "RegisterMaintenance"),
                RouteDescriptor::protected("/maintenance-history", "MaintenanceHistory"),
            ],
            login_path: "/".into(),
            landing_path: "/dashboard".into(),
        }
    }
}

// ── Decisions ────────────────────────────────────────────────────

/// Why a navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RedirectReason {
    /// Protected target, no session.
    LoginRequired,
    /// Login view requested while already authenticated.
    AlreadyAuthenticated,
    /// No route matched; catch-all.
    UnknownRoute,
}

/// Verdict for one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect { to: String, reason: RedirectReason },
}

/// Decide whether navigation to `target` may proceed.
///
/// Pure and synchronous. `_from` is accepted for hosts that want to
/// log or extend the decision; the table does not depend on it.
pub fn authorize(
    table: &RouteTable,
    target: &Resolution,
    _from: Option<&ResolvedRoute>,
    session: &Session,
) -> NavigationDecision {
    let route = match target {
        Resolution::Matched(route) => route,
        Resolution::Unmatched { .. } => {
            return NavigationDecision::Redirect {
                to: table.login_path.clone(),
                reason: RedirectReason::UnknownRoute,
            };
        }
    };

    let authenticated = session.is_authenticated();
    if route.descriptor.requires_auth && !authenticated {
        return NavigationDecision::Redirect {
            to: table.login_path.clone(),
            reason: RedirectReason::LoginRequired,
        };
    }
    if authenticated && route.path == table.login_path {
        return NavigationDecision::Redirect {
            to: table.landing_path.clone(),
            reason: RedirectReason::AlreadyAuthenticated,
        };
    }
    NavigationDecision::Allow
}

// ── Path helpers ─────────────────────────────────────────────────

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Canonical form: leading `/`, no trailing `/`, no query or fragment.
pub fn normalize(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let joined = segments(&raw[..end]).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::{Credential, IdentityClaims};
    use secrecy::SecretString;

    fn signed_in() -> Session {
        Session::authenticated(
            IdentityClaims::default(),
            Credential::new(SecretString::from("t".to_string())),
        )
    }

    fn decide(path: &str, session: &Session) -> NavigationDecision {
        let table = RouteTable::default();
        let target = table.resolve(path);
        authorize(&table, &target, None, session)
    }

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize("machines/"), "/machines");
        assert_eq!(normalize("/tools?tab=2#top"), "/tools");
        assert_eq!(normalize("//a//b/"), "/a/b");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn protected_route_without_session_redirects_to_login() {
        assert_eq!(
            decide("/dashboard", &Session::unauthenticated()),
            NavigationDecision::Redirect {
                to: "/".into(),
                reason: RedirectReason::LoginRequired
            }
        );
    }

    #[test]
    fn login_route_with_session_redirects_to_landing() {
        assert_eq!(
            decide("/", &signed_in()),
            NavigationDecision::Redirect {
                to: "/dashboard".into(),
                reason: RedirectReason::AlreadyAuthenticated
            }
        );
    }

    #[test]
    fn public_and_authorized_routes_are_allowed() {
        assert_eq!(
            decide("/", &Session::unauthenticated()),
            NavigationDecision::Allow
        );
        assert_eq!(decide("/machines", &signed_in()), NavigationDecision::Allow);
    }

    #[test]
    fn unknown_route_goes_to_login() {
        for session in [Session::unauthenticated(), signed_in()] {
            assert_eq!(
                decide("/nope", &session),
                NavigationDecision::Redirect {
                    to: "/".into(),
                    reason: RedirectReason::UnknownRoute
                }
            );
        }
    }

    #[test]
    fn params_are_captured_and_first_match_wins() {
        let table = RouteTable::new(
            vec![
                RouteDescriptor::public("/", "Login"),
                RouteDescriptor::protected("/machines/new", "NewMachine"),
                RouteDescriptor::protected("/machines/:id", "Machine"),
                RouteDescriptor::protected("/home", "Home"),
            ],
            "/",
            "/home",
        )
        .unwrap();

        let Resolution::Matched(route) = table.resolve("/machines/42") else {
            panic!("expected a match");
        };
        assert_eq!(route.descriptor.name, "Machine");
        assert_eq!(route.params["id"], "42");

        let Resolution::Matched(route) = table.resolve("/machines/new") else {
            panic!("expected a match");
        };
        assert_eq!(route.descriptor.name, "NewMachine");
    }

    #[test]
    fn table_rejects_protected_login_route() {
        let err = RouteTable::new(
            vec![
                RouteDescriptor::protected("/", "Login"),
                RouteDescriptor::protected("/home", "Home"),
            ],
            "/",
            "/home",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoutes { .. }));
    }

    #[test]
    fn default_table_is_valid() {
        let table = RouteTable::default();
        RouteTable::new(table.routes().to_vec(), table.login_path(), table.landing_path())
            .unwrap();
    }
}
