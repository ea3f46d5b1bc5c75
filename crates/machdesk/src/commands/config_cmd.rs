//! Config subcommand handlers.

use dialoguer::{Input, Select};

use machdesk_core::{FetchPolicy, InitMode, PatchMissPolicy};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            if p.password.is_some() {
                p.password = Some(MASK.into());
            }
            if p.refresh_token.is_some() {
                p.refresh_token = Some(MASK.into());
            }
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

/// TOML rendering for the table view.
fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Offer to store the password in the system keyring.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored
/// in the keyring.
fn prompt_password_storage(
    profile_name: &str,
    password: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_secret(profile_name, "password", password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

/// Apply one `config set` key to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    let parse_u64 = |field: &str, value: &str| -> Result<u64, CliError> {
        value
            .parse()
            .map_err(|_| invalid(field, "must be a number (seconds)"))
    };

    match key {
        "provider_url" | "provider-url" => profile.provider_url = Some(value),
        "realm" => profile.realm = Some(value),
        "client_id" | "client-id" => profile.client_id = Some(value),
        "mode" => {
            value
                .parse::<InitMode>()
                .map_err(|_| invalid("mode", "must be 'silent-check' or 'require-login'"))?;
            profile.mode = Some(value);
        }
        "username" => profile.username = Some(value),
        "api_url" | "api-url" => profile.api_url = Some(value),
        "resource_path" | "resource-path" => profile.resource_path = Some(value),
        "collection_field" | "collection-field" => profile.collection_field = Some(value),
        "per_page" | "per-page" => {
            let n: u32 = value
                .parse()
                .map_err(|_| invalid("per_page", "must be a positive number"))?;
            if n == 0 {
                return Err(invalid("per_page", "must be at least 1"));
            }
            profile.per_page = Some(n);
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "insecure" => {
            profile.insecure = Some(
                value
                    .parse()
                    .map_err(|_| invalid("insecure", "must be 'true' or 'false'"))?,
            );
        }
        "timeout" => profile.timeout = Some(parse_u64("timeout", &value)?),
        "init_timeout" | "init-timeout" => {
            profile.init_timeout = Some(parse_u64("init_timeout", &value)?);
        }
        "refresh_interval" | "refresh-interval" => {
            profile.refresh_interval = Some(parse_u64("refresh_interval", &value)?);
        }
        "patch_miss" | "patch-miss" => {
            profile.patch_miss = Some(value.parse::<PatchMissPolicy>().map_err(|_| {
                invalid("patch_miss", "must be 'ignore', 'reject', or 'insert'")
            })?);
        }
        "fetch_policy" | "fetch-policy" => {
            profile.fetch_policy = Some(value.parse::<FetchPolicy>().map_err(|_| {
                invalid("fetch_policy", "must be 'concurrent' or 'supersede'")
            })?);
        }
        other => {
            return Err(invalid(
                other,
                format!(
                    "unknown config key '{other}'. Valid keys: provider_url, realm, client_id, \
                     mode, username, api_url, resource_path, collection_field, per_page, \
                     ca_cert, insecure, timeout, init_timeout, refresh_interval, patch_miss, \
                     fetch_policy"
                ),
            ));
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            set_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: machdesk config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(&cfg, name));
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(&cfg, profile_name));
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(invalid("password", "value cannot be empty"));
            }
            config::store_secret(&profile_name, "password", &secret)?;

            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

fn init_wizard() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("machdesk configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let provider_url: String = Input::new()
        .with_prompt("Identity provider URL")
        .default("http://localhost:8080".into())
        .interact_text()
        .map_err(prompt_err)?;

    let realm: String = Input::new()
        .with_prompt("Realm")
        .default("machine_management".into())
        .interact_text()
        .map_err(prompt_err)?;

    let client_id: String = Input::new()
        .with_prompt("Client id")
        .default("frontend".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("Resource API URL")
        .default("http://127.0.0.1:5000".into())
        .interact_text()
        .map_err(prompt_err)?;

    let modes = &[
        "Silent check (start signed out unless a session is remembered)",
        "Require login (sign in on every start)",
    ];
    let mode = match Select::new()
        .with_prompt("Startup mode")
        .items(modes)
        .default(0)
        .interact()
        .map_err(prompt_err)?
    {
        0 => InitMode::SilentCheck,
        _ => InitMode::RequireLogin,
    };

    let username: String = Input::new()
        .with_prompt("Username (empty to skip)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut password = None;
    if !username.is_empty() {
        let pass = rpassword::prompt_password("Password (empty to skip): ").map_err(prompt_err)?;
        if !pass.is_empty() {
            password = prompt_password_storage(&profile_name, &pass)?;
        }
    }

    let profile = Profile {
        provider_url: Some(provider_url),
        realm: Some(realm),
        client_id: Some(client_id),
        mode: Some(mode.to_string()),
        username: (!username.is_empty()).then_some(username),
        password,
        api_url: Some(api_url),
        ..Profile::default()
    };

    // Validate before writing anything.
    machdesk_config::build_client_config(&profile, None, None)?;

    let mut cfg = config::load_config().unwrap_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    let written = config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", written.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: machdesk session status");
    Ok(())
}
