//! Session command handlers.

use std::io::IsTerminal;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::warn;

use machdesk_core::{Client, CoreError, GateState, Session};

use crate::cli::{GlobalOpts, SessionArgs, SessionCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

const REFRESH_TOKEN_KEY: &str = "refresh-token";

// ── View ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SessionView {
    profile: String,
    state: GateState,
    username: Option<String>,
    subject: Option<String>,
    email: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionView {
    fn new(profile: &str, session: &Session) -> Self {
        let claims = session.claims();
        Self {
            profile: profile.into(),
            state: session.state(),
            username: session.username().map(str::to_owned),
            subject: claims.subject().map(str::to_owned),
            email: claims.email().map(str::to_owned),
            expires_at: session
                .credential()
                .and_then(|c| c.expires_at)
                .or_else(|| claims.expires_at()),
        }
    }
}

fn render(view: &SessionView, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        view,
        |v| {
            let mut pairs = vec![
                ("Profile", v.profile.clone()),
                ("State", output::paint_state(v.state, color)),
            ];
            if let Some(ref user) = v.username {
                pairs.push(("User", user.clone()));
            }
            if let Some(ref email) = v.email {
                pairs.push(("Email", email.clone()));
            }
            if let Some(expires) = v.expires_at {
                pairs.push(("Expires", expires.to_rfc3339()));
            }
            output::detail_lines(&pairs)
        },
        |v| v.state.to_string(),
    );
    output::print_output(&out, global.quiet);
}

/// Attach the profile name to authentication failures.
fn for_profile(err: CoreError, profile: &str) -> CliError {
    match CliError::from(err) {
        CliError::AuthFailed { message, .. } => CliError::AuthFailed {
            profile: profile.into(),
            message,
        },
        other => other,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SessionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SessionCommand::Status => {
            let (name, cfg) = config::build_client_config(global)?;
            let client = Client::new(cfg)?;
            client.start().await?;

            render(&SessionView::new(&name, &client.session().current()), global);
            client.shutdown().await;
            Ok(())
        }

        SessionCommand::Login { remember } => {
            let (name, mut cfg) = config::build_client_config(global)?;
            if cfg.provider.username.is_none() {
                return Err(CliError::NoCredentials { profile: name });
            }
            if cfg.provider.password.is_none() {
                if !std::io::stdin().is_terminal() {
                    return Err(CliError::NoCredentials { profile: name });
                }
                let password = rpassword::prompt_password("Password: ")?;
                cfg.provider.password = Some(SecretString::from(password));
            }

            let client = Client::new(cfg)?;
            let authenticated = client.start().await?;
            if !authenticated {
                client.login().await.map_err(|e| for_profile(e, &name))?;
            }

            let session = client.session().current();
            if remember {
                match session.credential().and_then(|c| c.refresh_token.as_ref()) {
                    Some(token) => {
                        config::store_secret(&name, REFRESH_TOKEN_KEY, token.expose_secret())?;
                        if !global.quiet {
                            eprintln!("Session remembered for profile '{name}'");
                        }
                    }
                    None => warn!("provider issued no refresh token, nothing to remember"),
                }
            }

            render(&SessionView::new(&name, &session), global);
            client.shutdown().await;
            Ok(())
        }

        SessionCommand::Logout => {
            let (name, cfg) = config::build_client_config(global)?;
            let client = Client::new(cfg)?;
            client.start().await?;
            client.logout().await;
            client.shutdown().await;

            if let Err(e) = config::forget_secret(&name, REFRESH_TOKEN_KEY) {
                warn!(error = %e, "could not remove remembered session");
            }
            if !global.quiet {
                eprintln!("Signed out of profile '{name}'");
            }
            Ok(())
        }
    }
}
