//! Machine command handlers.

use std::sync::Arc;

use tabled::Tabled;
use tracing::debug;

use machdesk_core::{
    Client, ClientConfig, CoreError, EntityId, FetchSummary, Machine, PageParams,
};

use crate::cli::{GlobalOpts, MachinesArgs, MachinesCommand, PageArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Watch interval when neither the flag nor the profile sets one.
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 10;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct MachineRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&Arc<Machine>> for MachineRow {
    fn from(m: &Arc<Machine>) -> Self {
        Self {
            id: m.id.to_string(),
            name: m.name.clone(),
            category: m.category.clone(),
            group: m.group.clone(),
            manufacturer: m.manufacturer.clone(),
            created: m
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        }
    }
}

fn machine_detail(m: &Arc<Machine>) -> String {
    let extra: Vec<(String, String)> = m
        .extra
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    let mut pairs = vec![
        ("ID", m.id.to_string()),
        ("Name", m.name.clone()),
        ("Category", m.category.clone()),
        ("Group", m.group.clone()),
        ("Manufacturer", m.manufacturer.clone()),
    ];
    if let Some(created) = m.created_at {
        pairs.push(("Created", created.to_string()));
    }
    pairs.extend(extra.iter().map(|(k, v)| (k.as_str(), v.clone())));
    output::detail_lines(&pairs)
}

fn render_machines(machines: &[Arc<Machine>], global: &GlobalOpts) {
    let out = output::render_list(
        &global.output,
        machines,
        |m| MachineRow::from(m),
        |m| m.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

// ── Helpers ─────────────────────────────────────────────────────────

fn page_params(args: &PageArgs, cfg: &ClientConfig) -> Result<PageParams, CliError> {
    let params = PageParams::new(args.page, args.per_page.unwrap_or(cfg.page.per_page));
    Ok(params.validate()?)
}

fn summary_note(summary: &FetchSummary, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    if let (Some(total), Some(pages)) = (summary.total, summary.pages) {
        eprintln!("page {} of {pages}, {total} machines in total", summary.page);
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: MachinesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        MachinesCommand::List { page, category } => {
            let (_, cfg) = config::build_client_config(global)?;
            let params = page_params(&page, &cfg)?;

            let (summary, snapshot) = Client::oneshot(cfg, |client| async move {
                let summary = client.fetch_machines(params).await?;
                Ok::<_, CoreError>((summary, client.machines_snapshot()))
            })
            .await?;

            let machines: Vec<Arc<Machine>> = snapshot
                .iter()
                .filter(|m| category.as_deref().is_none_or(|c| m.category == c))
                .cloned()
                .collect();
            render_machines(&machines, global);
            summary_note(&summary, global);
            Ok(())
        }

        MachinesCommand::Get { id, page } => {
            let (_, cfg) = config::build_client_config(global)?;
            let params = page_params(&page, &cfg)?;
            let wanted = EntityId::from(id.as_str());

            let found = Client::oneshot(cfg, |client| async move {
                client.fetch_machines(params).await?;
                Ok::<_, CoreError>(client.store().get(&wanted))
            })
            .await?;

            let machine = found.ok_or_else(|| CliError::NotFound {
                resource_type: "machine".into(),
                identifier: id,
                list_command: "machines list".into(),
            })?;
            let out = output::render_single(&global.output, &machine, machine_detail, |m| {
                m.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MachinesCommand::Watch { page, interval } => {
            let (_, mut cfg) = config::build_client_config(global)?;
            cfg.page = page_params(&page, &cfg)?;
            cfg.refresh_interval_secs = interval
                .or(Some(cfg.refresh_interval_secs).filter(|s| *s > 0))
                .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS);
            if cfg.refresh_interval_secs == 0 {
                return Err(CliError::Validation {
                    field: "interval".into(),
                    reason: "must be at least 1 second".into(),
                });
            }
            watch(cfg, global).await
        }
    }
}

async fn watch(cfg: ClientConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let params = cfg.page;
    let client = Client::new(cfg)?;
    let mut machines = client.machines();

    client.start().await?;
    let first = client.fetch_machines(params).await;
    if let Err(e) = first {
        client.shutdown().await;
        return Err(e.into());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted, stopping watch");
                break;
            }
            snapshot = machines.changed() => {
                let Some(snapshot) = snapshot else { break };
                if !global.quiet {
                    eprintln!("── {} ──", chrono::Local::now().format("%H:%M:%S"));
                }
                render_machines(&snapshot, global);
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
