//! Route command handlers.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use machdesk_core::{
    Client, Credential, IdentityClaims, NavigationOutcome, RouteDescriptor, RouteTable, Router,
    Session, SessionHandle,
};

use crate::cli::{GlobalOpts, Principal, RoutesArgs, RoutesCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Access")]
    access: String,
}

fn route_row(table: &RouteTable, route: &RouteDescriptor) -> RouteRow {
    let mut access = if route.requires_auth {
        "signed in".to_string()
    } else {
        "public".to_string()
    };
    if table.is_login_path(&route.path) {
        access.push_str(", login");
    } else if route.path == table.landing_path() {
        access.push_str(", landing");
    }
    RouteRow {
        path: route.path.clone(),
        name: route.name.clone(),
        access,
    }
}

// ── Check view ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct CheckView {
    requested: String,
    #[serde(flatten)]
    outcome: NavigationOutcome,
}

fn check_detail(view: &CheckView) -> String {
    let route = &view.outcome.route;
    let mut pairs = vec![
        ("Requested", view.requested.clone()),
        ("Landed", format!("{} ({})", route.path, route.descriptor.name)),
    ];
    for hop in &view.outcome.redirects {
        pairs.push(("Redirect", format!("{} -> {} ({})", hop.from, hop.to, hop.reason)));
    }
    if !route.params.is_empty() {
        let params: Vec<String> = route.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.push(("Params", params.join(", ")));
    }
    output::detail_lines(&pairs)
}

/// A session standing in for `principal`, without contacting a provider.
fn offline_session(principal: Principal) -> Session {
    match principal {
        Principal::Anonymous => Session::unauthenticated(),
        Principal::Authenticated => Session::authenticated(
            IdentityClaims::default(),
            Credential::new(SecretString::from("offline".to_string())),
        ),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: RoutesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RoutesCommand::List => {
            let table = RouteTable::default();
            let out = output::render_list(
                &global.output,
                table.routes(),
                |r| route_row(&table, r),
                |r| r.path.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RoutesCommand::Check { path, principal } => {
            let outcome = match principal {
                Some(principal) => {
                    let router = Router::new(
                        Arc::new(RouteTable::default()),
                        SessionHandle::fixed(offline_session(principal)),
                    );
                    router.navigate(&path)?
                }
                None => {
                    let (_, cfg) = config::build_client_config(global)?;
                    let client = Client::new(cfg)?;
                    client.start().await?;
                    let outcome = client.navigate(&path);
                    client.shutdown().await;
                    outcome?
                }
            };

            let view = CheckView {
                requested: path,
                outcome,
            };
            let out = output::render_single(&global.output, &view, check_detail, |v| {
                v.outcome.route.path.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
