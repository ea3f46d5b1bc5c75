// OpenID Connect provider access
//
// Client-side contract for a Keycloak-style realm: token grants, refresh,
// and session termination. Token issuance and signature validation stay
// with the provider.

mod client;
mod token;

use std::fmt;
use std::str::FromStr;

pub use client::OidcClient;
pub use token::{TokenSet, decode_claims};

/// Proof-of-possession method advertised for authorization-code flows.
///
/// Carried through configuration so browser-capable hosts can pass it to
/// the provider; the password and refresh grants used here ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeChallengeMethod {
    /// SHA-256 challenge (`S256`).
    #[default]
    S256,
    /// Verifier sent as-is (`plain`).
    Plain,
}

impl CodeChallengeMethod {
    /// Wire value used in authorization requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" | "s256" => Ok(Self::S256),
            "plain" | "PLAIN" => Ok(Self::Plain),
            other => Err(format!("unknown code challenge method '{other}'")),
        }
    }
}

/// Realm-relative endpoint paths.
///
/// Keycloak exposes every OIDC endpoint under
/// `{base}/realms/{realm}/protocol/openid-connect/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Token,
    Logout,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Logout => "logout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_method_parses_both_spellings() {
        assert_eq!("S256".parse(), Ok(CodeChallengeMethod::S256));
        assert_eq!("plain".parse(), Ok(CodeChallengeMethod::Plain));
        assert!("md5".parse::<CodeChallengeMethod>().is_err());
    }
}
