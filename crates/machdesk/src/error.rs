//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use machdesk_config::ConfigError;
use machdesk_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Identity provider unavailable")]
    #[diagnostic(
        code(machdesk::provider_unavailable),
        help(
            "{reason}\n\
             Check that the provider is running and that provider_url and realm are right."
        )
    )]
    ProviderUnavailable { reason: String },

    #[error("Session could not be initialized")]
    #[diagnostic(
        code(machdesk::init_failed),
        help(
            "{reason}\n\
             Protected views stay unavailable until the provider answers.\n\
             Raise init_timeout in your profile if the provider is slow."
        )
    )]
    InitFailed { reason: String },

    #[error("Could not load machines: {reason}")]
    #[diagnostic(
        code(machdesk::fetch_failed),
        help("Check that the resource API is reachable. Try: machdesk machines list -v")
    )]
    FetchFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(machdesk::auth_failed),
        help(
            "Verify your username and password.\n\
             Run: machdesk config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("Session expired")]
    #[diagnostic(code(machdesk::session_expired), help("Run: machdesk session login"))]
    SessionExpired,

    #[error("The resource API rejected the request (HTTP {status})")]
    #[diagnostic(
        code(machdesk::unauthorized),
        help("Sign in first, or remember a session with: machdesk session login --remember")
    )]
    Unauthorized { status: u16 },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(machdesk::no_credentials),
        help(
            "Configure credentials with: machdesk config init\n\
             Or pass --username and set MACHDESK_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources & navigation ───────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(machdesk::not_found),
        help("Run: machdesk {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Redirect loop while navigating to {path}")]
    #[diagnostic(code(machdesk::redirect_loop))]
    RedirectLoop { path: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(machdesk::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(machdesk::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: machdesk config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(machdesk::config))]
    Config(ConfigError),

    // ── IO / Serialization / Internal ────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(machdesk::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProviderUnavailable { .. } | Self::InitFailed { .. } | Self::FetchFailed { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. }
            | Self::SessionExpired
            | Self::Unauthorized { .. }
            | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthInit { reason } => CliError::InitFailed { reason },

            CoreError::ProviderUnavailable { reason } => CliError::ProviderUnavailable { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::AuthSessionExpired => CliError::SessionExpired,

            CoreError::ResourceFetch {
                status: Some(status @ (401 | 403)),
                ..
            } => CliError::Unauthorized { status },

            CoreError::ResourceFetch { reason, .. } => CliError::FetchFailed { reason },

            CoreError::PatchTargetNotFound { id } => CliError::NotFound {
                resource_type: "machine".into(),
                identifier: id.to_string(),
                list_command: "machines list".into(),
            },

            CoreError::RedirectLoop { path } => CliError::RedirectLoop { path },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            other @ (CoreError::AlreadyInitialized { .. }
            | CoreError::NotReady { .. }
            | CoreError::InvalidRoutes { .. }
            | CoreError::Config { .. }
            | CoreError::Internal(_)) => CliError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_fetch_maps_to_auth_exit() {
        let err = CliError::from(CoreError::ResourceFetch {
            reason: "Endpoint returned HTTP 401: expired".into(),
            status: Some(401),
        });
        assert!(matches!(err, CliError::Unauthorized { status: 401 }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn server_failure_maps_to_connection_exit() {
        let err = CliError::from(CoreError::ResourceFetch {
            reason: "db down".into(),
            status: Some(500),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn missing_profile_lists_alternatives() {
        let err = CliError::from(ConfigError::ProfileNotFound {
            name: "lab".into(),
            available: vec!["default".into(), "plant".into()],
        });
        match err {
            CliError::ProfileNotFound { available, .. } => assert_eq!(available, "default, plant"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
